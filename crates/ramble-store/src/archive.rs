//! Directory archive for a trained model.
//!
//! An archive is a directory with five members: `model.json`
//! (hyperparameters), `table.dat` (token table), `model1.dat` and
//! `model2.dat` (forward and backward transition graphs), and
//! `blacklist.txt` (one name per line, `//` starts a comment).
//! Saving writes the whole set; loading validates every member before
//! a model is handed back.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use ramble_core::{Model, TokenTable, TransitionGraph};

use crate::error::{Result, StoreError};
use crate::wire::{
    WireGraph, WireHyper, WireTable, graph_to_wire, table_to_wire, wire_to_graph, wire_to_table,
};

pub const MODEL_FILE: &str = "model.json";
pub const TABLE_FILE: &str = "table.dat";
pub const FORWARD_FILE: &str = "model1.dat";
pub const BACKWARD_FILE: &str = "model2.dat";
pub const BLACKLIST_FILE: &str = "blacklist.txt";

/// True when `dir` looks like an archive (the hyperparameter member exists).
pub fn exists(dir: &Path) -> bool {
    dir.join(MODEL_FILE).is_file()
}

/// Write the full archive, creating the directory if needed.
/// Members are rewritten in place; a crash mid-save can leave the set
/// mixed, so callers that care should save to a fresh directory.
pub fn save(model: &Model, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let hyper = serde_json::to_string_pretty(&WireHyper::from_hyper(model.hyper()))?;
    fs::write(dir.join(MODEL_FILE), hyper)?;

    let table = serde_json::to_string(&table_to_wire(model.table()))?;
    fs::write(dir.join(TABLE_FILE), table)?;

    let forward = serde_json::to_string(&graph_to_wire(model.forward()))?;
    fs::write(dir.join(FORWARD_FILE), forward)?;

    let backward = serde_json::to_string(&graph_to_wire(model.backward()))?;
    fs::write(dir.join(BACKWARD_FILE), backward)?;

    fs::write(dir.join(BLACKLIST_FILE), format_blacklist(model.blacklist()))?;

    info!(
        path = %dir.display(),
        tokens = model.table().len(),
        forward_nodes = model.forward().node_count(),
        backward_nodes = model.backward().node_count(),
        "archive saved"
    );
    Ok(())
}

/// Read and validate an archive, reassembling the model.
pub fn load(dir: &Path) -> Result<Model> {
    let hyper = read_member::<WireHyper>(dir, MODEL_FILE)?.into_hyper()?;
    let table = wire_to_table(read_member::<WireTable>(dir, TABLE_FILE)?)?;
    let forward = load_graph(dir, FORWARD_FILE, &hyper, &table)?;
    let backward = load_graph(dir, BACKWARD_FILE, &hyper, &table)?;

    // Optional member: an archive without a blacklist is still valid.
    let blacklist = match fs::read_to_string(dir.join(BLACKLIST_FILE)) {
        Ok(text) => parse_blacklist(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
        Err(e) => return Err(e.into()),
    };

    info!(
        path = %dir.display(),
        tokens = table.len(),
        forward_nodes = forward.node_count(),
        backward_nodes = backward.node_count(),
        "archive loaded"
    );
    Ok(Model::from_state(hyper, table, forward, backward, blacklist))
}

fn read_member<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    debug!(path = %path.display(), "reading archive member");
    let text = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&text)?)
}

fn load_graph(
    dir: &Path,
    name: &str,
    hyper: &ramble_core::Hyper,
    table: &TokenTable,
) -> Result<TransitionGraph> {
    let wire = read_member::<WireGraph>(dir, name)?;
    wire_to_graph(wire, hyper, table)
        .map_err(|e| StoreError::InvalidData(format!("{name}: {e}")))
}

fn format_blacklist(blacklist: &HashSet<String>) -> String {
    let mut names: Vec<&str> = blacklist.iter().map(String::as_str).collect();
    names.sort_unstable();
    let mut out = String::from("// one blacklisted name per line\n");
    for name in names {
        out.push_str(name);
        out.push('\n');
    }
    out
}

fn parse_blacklist(text: &str) -> HashSet<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.split("//").next().unwrap_or("").trim();
            if line.is_empty() {
                None
            } else {
                Some(line.to_lowercase())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::path::PathBuf;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn temp_archive(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ramble-archive-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn trained_model() -> Model {
        let mut model = Model::default();
        let mut rng = rng();
        model
            .observe("the quick brown fox", "chan", &mut rng)
            .unwrap();
        model
            .observe("the lazy brown dog", "chan", &mut rng)
            .unwrap();
        model.blacklist_add("fox");
        model
    }

    #[test]
    fn test_save_then_load_restores_model() {
        let dir = temp_archive("roundtrip");
        let model = trained_model();
        save(&model, &dir).unwrap();

        let loaded = load(&dir).unwrap();
        assert_eq!(loaded.hyper(), model.hyper());
        assert_eq!(loaded.table().len(), model.table().len());
        assert_eq!(loaded.forward().node_count(), model.forward().node_count());
        assert_eq!(loaded.forward().edge_count(), model.forward().edge_count());
        assert_eq!(
            loaded.backward().node_count(),
            model.backward().node_count()
        );
        assert_eq!(loaded.blacklist(), model.blacklist());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_loaded_model_keeps_responding() {
        let dir = temp_archive("responds");
        save(&trained_model(), &dir).unwrap();

        let mut loaded = load(&dir).unwrap();
        let mut rng = rng();
        let reply = loaded.respond("the brown fox", "chan", &mut rng).unwrap();
        assert!(!reply.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_exists_reflects_save() {
        let dir = temp_archive("exists");
        assert!(!exists(&dir));
        save(&trained_model(), &dir).unwrap();
        assert!(exists(&dir));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_archive_is_io_error() {
        let dir = temp_archive("missing");
        assert!(matches!(load(&dir), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_load_without_blacklist_defaults_empty() {
        let dir = temp_archive("no-blacklist");
        let mut model = trained_model();
        model.blacklist_remove("fox");
        save(&model, &dir).unwrap();
        fs::remove_file(dir.join(BLACKLIST_FILE)).unwrap();

        let loaded = load(&dir).unwrap();
        assert!(loaded.blacklist().is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_rejects_corrupt_graph_member() {
        let dir = temp_archive("corrupt");
        save(&trained_model(), &dir).unwrap();
        fs::write(
            dir.join(FORWARD_FILE),
            r#"{"nodes":{"1":{"value":0,"context":[]}},"edges":[{"from":1,"to":77,"weight":1.0}]}"#,
        )
        .unwrap();

        assert!(matches!(load(&dir), Err(StoreError::InvalidData(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_blacklist_lines_tolerate_comments() {
        let parsed = parse_blacklist("// header\nfox\n\nDog // trailing note\n  badger  \n");
        let expected: HashSet<String> = ["fox", "dog", "badger"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(parsed, expected);
    }
}
