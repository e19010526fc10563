use linktap_types::stream::definitions;

/// Execute the `streams` command: print every replicable stream with
/// its key structure and parent wiring.
pub fn execute() {
    println!("{:<28} {:<24} {:<20} {}", "STREAM", "KEYS", "REPLICATION KEY", "PARENT");
    for def in definitions() {
        println!(
            "{:<28} {:<24} {:<20} {}",
            def.name,
            def.primary_keys.join(", "),
            def.replication_key.unwrap_or("-"),
            def.parent.unwrap_or("-"),
        );
    }
}
