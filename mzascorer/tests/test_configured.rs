use std::fs;

use figment::{
    providers::{Format, Toml},
    Figment,
};

#[test_log::test]
#[test_log(default_log_filter = "debug")]
fn test_configured() {
    fs::create_dir_all("tmp").unwrap();
    let mut config = Figment::new();
    config = config.merge(Toml::file_exact("tests/data/configured.toml"));
    let driver: mzascorer::MZAScorer = config.extract().unwrap();
    assert_eq!(driver.threads, 2);
    assert_eq!(driver.scoring.depth_window, Some(200.0));
    driver.main().unwrap();

    let text = fs::read_to_string("tmp/configured_output.tsv").unwrap();
    let mut lines = text.lines();
    let header: Vec<_> = lines.next().unwrap().split('\t').collect();
    assert_eq!(header[0], "psm_id");
    assert_eq!(header.len(), 16);
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][7], "unambiguous");
    assert_eq!(rows[2][7], "unscored");
    assert_eq!(rows[3][0], "4");
}
