use std::fs;
use tempfile::TempDir;

use ragflow_core::config::{expand_path, resolve_with_base, EmbeddingProvider, Settings, StoreBackend};
use ragflow_core::document::{collect_inputs, read_document};
use ragflow_core::{DocumentInput, Error};

#[test]
fn read_text_input_passes_through() {
    let input = DocumentInput::named_text("inline", "Short text");
    let (source_id, text) = read_document(&input).expect("read");
    assert_eq!(source_id, "inline");
    assert_eq!(text, "Short text");
}

#[test]
fn read_file_falls_back_to_latin1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("legacy.txt");
    fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

    let (source_id, text) = read_document(&DocumentInput::file(&path)).expect("read");
    assert_eq!(text, "café");
    assert!(source_id.ends_with("legacy.txt"));
}

#[test]
fn missing_file_is_a_document_read_error() {
    let tmp = TempDir::new().unwrap();
    let err = read_document(&DocumentInput::file(tmp.path().join("nope.txt"))).unwrap_err();
    assert!(matches!(err, Error::DocumentRead { .. }), "got {err:?}");
    assert!(!err.is_structural());
}

#[test]
fn collect_inputs_walks_directories() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir(dir.join("nested")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("a.md"), "alpha").unwrap();
    fs::write(dir.join("nested/c.txt"), "charlie").unwrap();
    fs::write(dir.join("skip.bin"), [0u8, 1, 2]).unwrap();

    let inputs = collect_inputs(&[dir.to_path_buf(), dir.join("missing.txt")]);
    let names: Vec<String> = inputs
        .iter()
        .map(|i| match i {
            DocumentInput::File(p) => p.file_name().unwrap().to_string_lossy().into_owned(),
            DocumentInput::Text { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(names, ["a.md", "b.txt", "c.txt", "missing.txt"]);
}

#[test]
fn settings_defaults_match_documented_values() {
    let tmp = TempDir::new().unwrap();
    let settings = Settings::load_from(tmp.path()).expect("load");
    assert_eq!(settings.pipeline.chunk_size, 500);
    assert_eq!(settings.pipeline.chunk_overlap, 50);
    assert_eq!(settings.pipeline.top_k, 3);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Hashing);
    assert_eq!(settings.store.backend, StoreBackend::Memory);
    assert_eq!(settings.generation.base_url, "http://localhost:1234");
}

#[test]
fn settings_merge_toml_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[pipeline]\nchunk_size = 200\ntop_k = 5\n\n[store]\nlocation = \":memory:\"\n",
    )
    .unwrap();
    let settings = Settings::load_from(tmp.path()).expect("load");
    assert_eq!(settings.pipeline.chunk_size, 200);
    assert_eq!(settings.pipeline.chunk_overlap, 50);
    assert_eq!(settings.pipeline.top_k, 5);
    assert!(settings.store.is_ephemeral());
}

#[test]
fn settings_reject_overlap_not_below_size() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[pipeline]\nchunk_size = 50\nchunk_overlap = 50\n").unwrap();
    let err = Settings::load_from(tmp.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)), "got {err:?}");
}

#[test]
fn expand_path_handles_tilde() {
    let expanded = expand_path("~/ragflow");
    assert!(!expanded.to_string_lossy().starts_with('~'));
}

#[test]
fn relative_locations_resolve_against_base() {
    let base = std::path::Path::new("/srv/ragflow");
    assert_eq!(resolve_with_base(base, "data/index"), base.join("data/index"));
    assert_eq!(resolve_with_base(base, "/var/lib/ragflow"), std::path::PathBuf::from("/var/lib/ragflow"));
    assert_eq!(expand_path("${RAGFLOW_SURELY_UNSET_VAR}/x"), std::path::PathBuf::from("${RAGFLOW_SURELY_UNSET_VAR}/x"));
}
