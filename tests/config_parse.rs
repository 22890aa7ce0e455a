use medreport_analyzer::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../medreport.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.labs.mode, "grammar");
    assert!(cfg.labs.units.iter().any(|u| u == "g/dL"));
    assert_eq!(cfg.llm.model, "gpt-4o-mini");
    assert_eq!(cfg.llm.max_tokens, 800);
    assert!(!cfg.logging.write_to_file);
}

#[test]
fn example_matches_defaults() {
    let raw = include_str!("../medreport.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    let def = Config::default();
    assert_eq!(cfg.labs.units, def.labs.units);
    assert_eq!(cfg.labs.ignore_names, def.labs.ignore_names);
    assert_eq!(cfg.input.allowed_extensions, def.input.allowed_extensions);
    assert_eq!(cfg.server.bind, def.server.bind);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str("[llm]\nmodel = \"local-model\"\n").expect("parse TOML");
    assert_eq!(cfg.llm.model, "local-model");
    assert_eq!(cfg.llm.temperature, 0.7);
    assert_eq!(cfg.ocr.tesseract_cmd, "auto");
    assert_eq!(cfg.labs.max_name_words, 4);
}
