use std::fs;
use std::path::PathBuf;

use instance_sampler_tools::ToolConfig;

fn write_temp_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("instance-sampler.toml");
    fs::write(&path, contents).expect("write temp config");
    path
}

#[test]
fn loads_minimal_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_temp_config(&dir, "manifest = \"corpus/manifest.json\"\n");
    let cfg = ToolConfig::from_path(&path).expect("load config");
    assert_eq!(cfg.manifest, PathBuf::from("corpus/manifest.json"));
    assert_eq!(cfg.test_candidates, instance_sampler::DEFAULT_TEST_CANDIDATES);
    assert_eq!(cfg.sampler, instance_sampler::SamplerConfig::default());
}

#[test]
fn sampler_section_overrides_defaults() {
    let cfg = ToolConfig::from_toml(
        r#"
        manifest = "corpus/manifest.json"
        test_candidates = 64

        [sampler]
        random_box = true
        neg_bias = 2.0
        exclude = ["broken.jpg"]
        "#,
    )
    .expect("parse config");
    assert_eq!(cfg.test_candidates, 64);
    assert!(cfg.sampler.random_box);
    assert_eq!(cfg.sampler.neg_bias, 2.0);
    assert_eq!(cfg.sampler.exclude, vec!["broken.jpg".to_string()]);
    // untouched knobs keep their defaults
    assert_eq!(cfg.sampler.max_negative_rounds, 100);
}

#[test]
fn unknown_env_vars_stay_verbatim() {
    let cfg = ToolConfig::from_toml(
        "manifest = \"a/${INSTANCE_SAMPLER_SURELY_UNSET_VAR}/b\"\noutput = \"plain/${open\"\n",
    )
    .expect("parse config");
    assert_eq!(
        cfg.manifest,
        PathBuf::from("a/${INSTANCE_SAMPLER_SURELY_UNSET_VAR}/b")
    );
    assert_eq!(cfg.output, Some(PathBuf::from("plain/${open")));
}

#[test]
fn missing_file_gives_none() {
    let dir = tempfile::tempdir().expect("temp dir");
    assert!(ToolConfig::from_path(&dir.path().join("absent.toml")).is_none());
}

#[test]
fn bad_file_gives_none() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_temp_config(&dir, "manifest = [");
    assert!(ToolConfig::from_path(&path).is_none());
}
