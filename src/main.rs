//! Claim Store entry point
//!
//! On web: initializes logging and brings the stored claim document up to
//! date on page load. Natively: a small inspection tool over a directory
//! backed store.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    use claim_store::ClaimStore;
    use claim_store::platform::LocalStorageBackend;

    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    log::info!("Claim store starting...");

    match LocalStorageBackend::open() {
        Ok(backend) => {
            // Migrates, repairs or initializes as needed
            let doc = ClaimStore::new(backend).load();
            log::info!(
                "Claim data ready (schema v{}, {} evidence items)",
                doc.schema_version,
                doc.evidence.count
            );
        }
        Err(e) => log::error!("LocalStorage unavailable: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(message) = cli::run(&args) {
        eprintln!("{message}");
        eprintln!();
        eprintln!("{}", cli::USAGE);
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use claim_store::persistence::BackupReason;
    use claim_store::platform::FileBackend;
    use claim_store::{ClaimStore, Section};

    pub const USAGE: &str = "\
usage: claim-store <dir> <command>

commands:
  show                     print the root document
  section <name>           print one section
  export                   print an export envelope
  import <file>            import an export file
  backups                  list backups
  backup                   create a manual backup
  restore-backup <id>      restore a backup
  snapshots                list snapshots
  snapshot [label]         create a snapshot
  restore-snapshot <id>    restore a snapshot
  reindex                  repair structure and recompute counts
  purge                    delete all claim data";

    pub fn run(args: &[String]) -> Result<(), String> {
        let [dir, command, rest @ ..] = args else {
            return Err("missing arguments".to_string());
        };
        let backend = FileBackend::open(dir).map_err(|e| e.to_string())?;
        let store = ClaimStore::new(backend);
        let arg = rest.first().map(String::as_str);

        match (command.as_str(), arg) {
            ("show", None) => print_json(&store.load()),
            ("section", Some(name)) => {
                let section: Section = name.parse().map_err(|e| format!("{e}"))?;
                print_json(&store.get_section(section).to_value())
            }
            ("export", None) => {
                let json = store.export_as_json().ok_or("export failed")?;
                println!("{json}");
                Ok(())
            }
            ("import", Some(path)) => {
                let raw = std::fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
                check(store.import_json(&raw), "import rejected")
            }
            ("backups", None) => {
                for b in store.list_backups() {
                    println!("{}\t{}\t{}", b.id, b.reason, b.timestamp);
                }
                Ok(())
            }
            ("backup", None) => check(store.backup(BackupReason::Manual), "backup failed"),
            ("restore-backup", Some(id)) => {
                check(store.restore_backup(parse_id(id)?), "no such backup")
            }
            ("snapshots", None) => {
                for s in store.list_snapshots() {
                    println!("{}\t{}\t{}", s.id, s.timestamp, s.label);
                }
                Ok(())
            }
            ("snapshot", label) => {
                let id = store
                    .create_snapshot(label.unwrap_or_default())
                    .ok_or("snapshot failed")?;
                println!("{id}");
                Ok(())
            }
            ("restore-snapshot", Some(id)) => {
                check(store.restore_snapshot(parse_id(id)?), "no such snapshot")
            }
            ("reindex", None) => {
                let doc = store.reindex();
                println!(
                    "evidence: {}, documents: {}",
                    doc.evidence.count, doc.documents.count
                );
                Ok(())
            }
            ("purge", None) => check(store.purge_all(), "purge incomplete"),
            (other, _) => Err(format!("unknown command or arguments: {other}")),
        }
    }

    fn parse_id(raw: &str) -> Result<i64, String> {
        raw.parse().map_err(|_| format!("invalid id: {raw}"))
    }

    fn check(ok: bool, failure: &str) -> Result<(), String> {
        if ok { Ok(()) } else { Err(failure.to_string()) }
    }

    fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
        let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
        println!("{json}");
        Ok(())
    }
}
