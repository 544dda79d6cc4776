use sdict_core::{AddOptions, DictFile};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/demo.sdict".to_string());

    println!("Dictionary: {path}\n");

    {
        let mut dict = DictFile::open(&path)?;
        println!("created new file: {}", dict.created_file());

        let opts = AddOptions {
            flush_words: false,
            skip_dup_check: false,
        };
        dict.add_word_with("latch", "a fastening for a door or gate", opts)?;
        dict.add_word_with("bolt", "a fastening for a door or gate", opts)?;
        dict.add_word_with("hinge", "a joint on which a door turns", opts)?;
        dict.flush()?;
        println!("stored {} words", dict.num_words());
    }

    // reopen and read back; "latch" and "bolt" share one stored body
    let mut dict = DictFile::open(&path)?;
    for word in ["latch", "bolt", "hinge", "missing"] {
        match dict.find(word)? {
            Some(def) => println!("{word}: {}", String::from_utf8_lossy(&def)),
            None => println!("{word}: (not found)"),
        }
    }

    Ok(())
}
