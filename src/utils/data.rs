use crate::reconciler::Standing;
use crate::store::LeagueSnapshot;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

/// Save league data to a JSON file
pub fn save_snapshot(snapshot: &LeagueSnapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json =
        serde_json::to_string_pretty(snapshot).context("Failed to serialize league data")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load league data from a JSON file
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<LeagueSnapshot> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: LeagueSnapshot =
        serde_json::from_str(&json).context("Failed to deserialize league data")?;
    Ok(snapshot)
}

/// Save season standings to CSV
pub fn save_standings_to_csv(standings: &[Standing], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    write_standings_csv(standings, file)
}

/// Write standings CSV with a header row into any writer
pub fn write_standings_csv<W: std::io::Write>(standings: &[Standing], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Rank", "Name", "User", "Points", "Weeks"])?;
    for (rank, standing) in standings.iter().enumerate() {
        writer.serialize((
            rank + 1,
            &standing.display_name,
            &standing.user_id,
            standing.total,
            standing.weeks_scored,
        ))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standings() -> Vec<Standing> {
        vec![
            Standing {
                user_id: "alice".to_string(),
                display_name: "Alice, Esq.".to_string(),
                total: 13,
                weeks_scored: 2,
            },
            Standing {
                user_id: "bob".to_string(),
                display_name: "Bob".to_string(),
                total: 0,
                weeks_scored: 1,
            },
        ]
    }

    #[test]
    fn test_standings_csv() {
        let mut out = Vec::new();
        write_standings_csv(&standings(), &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert_eq!(
            csv,
            "Rank,Name,User,Points,Weeks\n1,\"Alice, Esq.\",alice,13,2\n2,Bob,bob,0,1\n"
        );
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("parlay_picks_{}", std::process::id()));
        let path = dir.join("league.json");

        let mut snapshot = LeagueSnapshot::default();
        snapshot
            .users
            .insert("alice".to_string(), "Alice".to_string());
        save_snapshot(&snapshot, &path).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.users.get("alice").map(String::as_str), Some("Alice"));
        assert!(loaded.games.is_empty());

        std::fs::remove_dir_all(&dir).ok();
        assert!(load_snapshot(&path).is_err());
    }
}
