//! Loader and consolidation view against an in-memory SQLite store.

use std::collections::HashSet;

use super::support::{place_line, sqlite_store, write_file};
use crate::config::{CityViewConfig, DbConfig};
use crate::loader::{LoadError, Loader};
use crate::store::schema::{ADMIN_CODES_TABLE, ALTERNATE_NAMES_TABLE};
use crate::store::{ReferenceStore, SqlStore};

fn admin_line(code: &str, name: &str, geonameid: i64) -> String {
    format!("{code}\t{name}\t{name}\t{geonameid}")
}

#[test]
fn new_york_scenario_consolidates_with_region() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[place_line(
            5128581,
            "New York City",
            "New York City,NYC,Big Apple",
            "US",
            "NY",
            8804190,
        )],
    );
    let admin = write_file(
        tmp.path(),
        "admin1CodesASCII.txt",
        &[admin_line("US.NY", "New York", 5128638)],
    );

    let store = sqlite_store();
    let loader = Loader::new(&store, 100);

    let report = loader.load_places(&places).unwrap();
    assert_eq!(report.table, "geoname_cities15000");
    assert_eq!(report.rows, 1);

    let report = loader.load_admin_codes(&admin).unwrap();
    assert_eq!(report.table, ADMIN_CODES_TABLE);
    assert_eq!(report.rows, 1);

    let cities = store.resolved_cities().unwrap();
    assert_eq!(cities.len(), 1);

    let nyc = &cities[0];
    assert_eq!(nyc.geonameid, 5128581);
    assert_eq!(nyc.name, "New York City");
    assert_eq!(nyc.region.as_deref(), Some("New York"));
    assert_eq!(nyc.country_code, "US");
    assert_eq!(nyc.alternatenames, "New York City,NYC,Big Apple");
}

#[test]
fn configured_admin_table_feeds_region() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[place_line(5128581, "New York City", "NYC", "US", "NY", 8804190)],
    );
    let admin = write_file(
        tmp.path(),
        "admin1CodesASCII.txt",
        &[admin_line("US.NY", "New York", 5128638)],
    );

    let view = CityViewConfig {
        admin_table: "admin1_labels".to_string(),
        ..Default::default()
    };
    let store = SqlStore::connect(&DbConfig::sqlite_memory(), view).unwrap();
    let loader = Loader::new(&store, 100).with_admin_table("admin1_labels");
    loader.load_places(&places).unwrap();
    let report = loader.load_admin_codes(&admin).unwrap();

    assert_eq!(report.table, "admin1_labels");
    assert_eq!(store.count("admin1_labels").unwrap(), 1);

    let cities = store.resolved_cities().unwrap();
    assert_eq!(cities[0].region.as_deref(), Some("New York"));
}

#[test]
fn missing_label_leaves_region_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[
            place_line(5128581, "New York City", "NYC", "US", "NY", 8804190),
            place_line(2988507, "Paris", "Paname", "FR", "11", 2138551),
            place_line(6691831, "Vatican City", "", "VA", "", 829),
        ],
    );
    let admin = write_file(
        tmp.path(),
        "admin1CodesASCII.txt",
        &[
            admin_line("US.NY", "New York", 5128638),
            admin_line("US.CA", "California", 5332921),
        ],
    );

    let store = sqlite_store();
    let loader = Loader::new(&store, 100);
    loader.load_places(&places).unwrap();
    loader.load_admin_codes(&admin).unwrap();

    let cities = store.resolved_cities().unwrap();
    assert_eq!(cities.len(), 3);

    for city in &cities {
        match city.geonameid {
            5128581 => assert_eq!(city.region.as_deref(), Some("New York")),
            2988507 => assert_eq!(city.region, None),
            6691831 => {
                assert_eq!(city.region, None);
                assert_eq!(city.alternatenames, "");
            }
            other => panic!("unexpected geonameid {other}"),
        }
    }
}

#[test]
fn round_trip_preserves_ids_and_countries() {
    let tmp = tempfile::tempdir().unwrap();
    let source = vec![
        (524901, "Moscow", "RU", "48"),
        (498817, "Saint Petersburg", "RU", "66"),
        (2643743, "London", "GB", "ENG"),
        (3117735, "Madrid", "ES", "29"),
        (1850147, "Tokyo", "JP", "40"),
    ];
    let lines: Vec<String> = source
        .iter()
        .map(|(id, name, cc, a1)| place_line(*id, name, name, cc, a1, 1_000_000))
        .collect();
    let places = write_file(tmp.path(), "cities15000.txt", &lines);

    let store = sqlite_store();
    // Small batches exercise multi-statement appends.
    Loader::new(&store, 2).load_places(&places).unwrap();
    store
        .ensure_table(&crate::store::schema::ADMIN_LABEL_SCHEMA, ADMIN_CODES_TABLE)
        .unwrap();

    let expected: HashSet<(i64, String)> = source
        .iter()
        .map(|(id, _, cc, _)| (*id, cc.to_string()))
        .collect();
    let actual: HashSet<(i64, String)> = store
        .resolved_cities()
        .unwrap()
        .into_iter()
        .map(|c| (c.geonameid, c.country_code))
        .collect();

    assert_eq!(actual, expected);
}

#[test]
fn consolidated_rows_are_ordered_by_geonameid() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[
            place_line(30, "C", "C", "US", "NY", 20000),
            place_line(10, "A", "A", "US", "NY", 20000),
            place_line(20, "B", "B", "US", "NY", 20000),
        ],
    );

    let store = sqlite_store();
    let loader = Loader::new(&store, 100);
    loader.load_places(&places).unwrap();
    store
        .ensure_table(&crate::store::schema::ADMIN_LABEL_SCHEMA, ADMIN_CODES_TABLE)
        .unwrap();

    let ids: Vec<i64> = store
        .resolved_cities()
        .unwrap()
        .iter()
        .map(|c| c.geonameid)
        .collect();
    assert_eq!(ids, vec![10, 20, 30]);
}

#[test]
fn duplicate_labels_do_not_multiply_cities() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[place_line(5128581, "New York City", "NYC", "US", "NY", 8804190)],
    );
    let admin = write_file(
        tmp.path(),
        "admin1CodesASCII.txt",
        &[admin_line("US.NY", "New York", 5128638)],
    );

    let store = sqlite_store();
    let loader = Loader::new(&store, 100);
    loader.load_places(&places).unwrap();
    loader.load_admin_codes(&admin).unwrap();
    loader.load_admin_codes(&admin).unwrap();

    assert_eq!(store.count(ADMIN_CODES_TABLE).unwrap(), 2);
    assert_eq!(store.resolved_cities().unwrap().len(), 1);
}

#[test]
fn reloading_appends_duplicate_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[place_line(5128581, "New York City", "NYC", "US", "NY", 8804190)],
    );

    let store = sqlite_store();
    let loader = Loader::new(&store, 100);
    loader.load_places(&places).unwrap();
    loader.load_places(&places).unwrap();

    assert_eq!(store.count("geoname_cities15000").unwrap(), 2);
}

#[test]
fn min_population_filters_consolidated_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[
            place_line(1, "Big", "Big", "US", "NY", 500_000),
            place_line(2, "Small", "Small", "US", "NY", 900),
        ],
    );

    let view = CityViewConfig {
        min_population: Some(15_000),
        ..Default::default()
    };
    let store = SqlStore::connect(&DbConfig::sqlite_memory(), view).unwrap();
    let loader = Loader::new(&store, 100);
    loader.load_places(&places).unwrap();
    store
        .ensure_table(&crate::store::schema::ADMIN_LABEL_SCHEMA, ADMIN_CODES_TABLE)
        .unwrap();

    let cities = store.resolved_cities().unwrap();
    assert_eq!(cities.len(), 1);
    assert_eq!(cities[0].name, "Big");
}

#[test]
fn column_count_mismatch_aborts_load() {
    let tmp = tempfile::tempdir().unwrap();
    let admin = write_file(
        tmp.path(),
        "admin1CodesASCII.txt",
        &[
            admin_line("US.NY", "New York", 5128638),
            "US.CA\tCalifornia\tCalifornia".to_string(),
        ],
    );

    let store = sqlite_store();
    let result = Loader::new(&store, 100).load_admin_codes(&admin);

    match result {
        Err(LoadError::ColumnCount {
            line,
            expected,
            found,
            ..
        }) => {
            assert_eq!(line, 2);
            assert_eq!(expected, 4);
            assert_eq!(found, 3);
        }
        other => panic!("expected column count error, got {other:?}"),
    }
}

#[test]
fn invalid_value_reports_line_and_column() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bad = place_line(3, "Broken", "Broken", "US", "NY", 1);
    bad = bad.replacen("40.71427", "north", 1);
    let places = write_file(tmp.path(), "cities15000.txt", &[bad]);

    let store = sqlite_store();
    let err = Loader::new(&store, 100).load_places(&places).unwrap_err();

    match err {
        LoadError::InvalidValue { line, source } => {
            assert_eq!(line, 1);
            assert_eq!(source.column, "latitude");
        }
        other => panic!("expected invalid value error, got {other:?}"),
    }
}

#[test]
fn failed_load_keeps_rows_from_earlier_batches() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "cities15000.txt",
        &[
            place_line(1, "A", "A", "US", "NY", 20000),
            place_line(2, "B", "B", "US", "NY", 20000),
            "3\tbroken".to_string(),
        ],
    );

    let store = sqlite_store();
    let result = Loader::new(&store, 1).load_places(&places);

    assert!(matches!(result, Err(LoadError::ColumnCount { line: 3, .. })));
    assert_eq!(store.count("geoname_cities15000").unwrap(), 2);
}

#[test]
fn invalid_utf8_is_a_load_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("admin1CodesASCII.txt");
    std::fs::write(&path, b"US.NY\tNew \xff York\tNew York\t5128638\n").unwrap();

    let store = sqlite_store();
    let result = Loader::new(&store, 100).load_admin_codes(&path);

    assert!(matches!(result, Err(LoadError::Csv(_))));
}

#[test]
fn alternate_names_load_full_and_short_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_file(
        tmp.path(),
        "alternateNamesV2.txt",
        &[
            "1\t5128581\ten\tBig Apple\t\t\t1\t\t\t".to_string(),
            "2\t1275339\ten\tBombay\t\t\t\t1\t\t1995".to_string(),
            "3\t524901\tru\tМосква".to_string(),
        ],
    );

    let store = sqlite_store();
    let report = Loader::new(&store, 100).load_alternate_names(&path).unwrap();

    assert_eq!(report.table, ALTERNATE_NAMES_TABLE);
    assert_eq!(report.rows, 3);
    assert_eq!(store.count(ALTERNATE_NAMES_TABLE).unwrap(), 3);
}

#[test]
fn place_table_name_comes_from_file_name() {
    let tmp = tempfile::tempdir().unwrap();
    let places = write_file(
        tmp.path(),
        "RU.txt",
        &[place_line(524901, "Moscow", "Moskva", "RU", "48", 10_000_000)],
    );

    let store = sqlite_store();
    let report = Loader::new(&store, 100).load_places(&places).unwrap();

    assert_eq!(report.table, "geoname_ru");
    assert_eq!(store.count("geoname_ru").unwrap(), 1);
}

#[test]
fn consolidation_fails_when_tables_are_missing() {
    let store = sqlite_store();
    assert!(store.resolved_cities().is_err());
}
