//! Status command implementation

use std::path::Path;

use anyhow::Result;
use cadence_core::db::DB_KEY_ENV;
use cadence_core::models::Scope;
use cadence_core::store::{AlertStore, BalanceStore, CatalogStore};

use super::{format_money, open_db};

pub fn cmd_status(db_path: &Path, no_encrypt: bool, scope: Scope) -> Result<()> {
    println!();
    println!("📊 Cadence Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = std::fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                println!();
                println!("   Scope: {}", scope);
                let all = db.list_sources(scope, false)?;
                let active = db.list_sources(scope, true)?;
                println!("   Sources: {} ({} active)", all.len(), active.len());
                match db.latest_confirmed_balance(scope)? {
                    Some((amount, as_of)) => {
                        println!("   Balance: {} (as of {})", format_money(amount), as_of)
                    }
                    None => println!("   Balance: (none recorded)"),
                }
                println!("   Unread alerts: {}", db.count_unread_alerts(scope)?);
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
