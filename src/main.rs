//! TRIDENT - LSM-Tree Key-Value Storage Engine
//! Interactive shell over the embeddable store.

use std::io::{self, BufRead, Write};

use trident::{Config, KeyValueStore};

fn main() {
    env_logger::init();

    println!();
    println!("  ╔═══════════════════════════════════════════╗");
    println!("  ║          TRIDENT Storage Engine           ║");
    println!("  ║      LSM-Tree Key-Value Store v0.1.0      ║");
    println!("  ╚═══════════════════════════════════════════╝");
    println!();
    println!("  Commands:");
    println!("    set <key> <value>  - Store a key-value pair");
    println!("    get <key>          - Retrieve a value by key");
    println!("    del <key>          - Delete a key");
    println!("    flush              - Persist the memtable to an SSTable");
    println!("    info               - Show engine statistics");
    println!("    exit               - Shutdown engine");
    println!();

    let config = Config::default();
    let store = match KeyValueStore::open(config) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("[ERROR] Failed to open store: {}", err);
            std::process::exit(1);
        }
    };
    store.start();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("trident> ");
        stdout.flush().unwrap();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap() == 0 {
            break; // EOF
        }

        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_lowercase().as_str() {
            "set" | "put" => {
                if parts.len() < 3 {
                    println!("  Usage: set <key> <value>");
                    continue;
                }
                let key = parts[1].as_bytes();
                let value = parts[2..].join(" ");
                if store.put(key, value.as_bytes()) {
                    println!("  OK");
                } else {
                    println!("  ERROR: commit log write failed");
                }
            }
            "get" => {
                if parts.len() < 2 {
                    println!("  Usage: get <key>");
                    continue;
                }
                match store.get(parts[1].as_bytes()) {
                    Some(value) => match String::from_utf8(value) {
                        Ok(s) => println!("  \"{}\"", s),
                        Err(_) => println!("  <binary data>"),
                    },
                    None => println!("  (nil)"),
                }
            }
            "del" | "delete" => {
                if parts.len() < 2 {
                    println!("  Usage: del <key>");
                    continue;
                }
                if store.delete(parts[1].as_bytes()) {
                    println!("  OK (deleted)");
                } else {
                    println!("  ERROR: commit log write failed");
                }
            }
            "flush" => match store.flush() {
                Ok(()) => println!("  OK ({} sstables)", store.sstable_count()),
                Err(e) => println!("  ERROR: {}", e),
            },
            "info" | "stats" => {
                println!("  MemTable items: {}", store.memtable_item_count());
                println!("  MemTable size:  {} bytes", store.memtable_byte_count());
                println!("  SSTables:       {}", store.sstable_count());
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down TRIDENT...");
                store.stop(false);
                break;
            }
            _ => {
                println!("  Unknown command: '{}'. Type 'exit' to quit.", parts[0]);
            }
        }
    }
}
