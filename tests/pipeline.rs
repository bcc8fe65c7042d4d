use std::collections::{HashMap, HashSet};
use std::io::Write;

use proptest::prelude::*;

use qevr::config::Config;
use qevr::data::detect::ColumnPatterns;
use qevr::data::export::{write_report, HEADER, SEVERITY};
use qevr::data::filter::{AddressFilter, FilterMode};
use qevr::data::loader::CsvSource;
use qevr::data::model::ScanModel;
use qevr::ErrorKind;

/// Parse a rendered report back into `address → {id}` and the per-line id counts.
fn parse_report(text: &str) -> (HashMap<String, HashSet<String>>, Vec<usize>) {
    assert!(text.starts_with(HEADER));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let mut pairs: HashMap<String, HashSet<String>> = HashMap::new();
    let mut sizes = Vec::new();
    for record in reader.records() {
        let record = record.unwrap();
        assert_eq!(&record[2], SEVERITY);
        let ids: Vec<&str> = record[1].split(',').collect();
        sizes.push(ids.len());
        let entry = pairs.entry(record[0].to_string()).or_default();
        for id in ids {
            assert!(entry.insert(id.to_string()), "duplicate {id} for {}", &record[0]);
        }
    }
    (pairs, sizes)
}

fn render(model: &ScanModel) -> String {
    let mut out = Vec::new();
    write_report(model, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn scan_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn scan_export_to_report() {
    let file = scan_file(
        "\"IP\",\"DNS\",\"QID\",\"Title\",\"CVE ID\"\n\
         \"10.0.0.1\",\"a.corp\",\"1\",\"Heartbleed, OpenSSL\",\"CVE-2014-0160\"\n\
         \"10.0.0.1\",\"a.corp\",\"2\",\"EternalBlue\",\"CVE-2017-0144\"\n\
         \"10.0.0.1\",\"a.corp\",\"2\",\"EternalBlue\",\"CVE-2017-0144\"\n\
         \"10.0.0.2\",\"b.corp\"\n\
         \"192.168.7.9\",\"c.corp\",\"3\",\"BlueKeep\",\"CVE-2019-0708\"\n\
         \"172.16.0.4\",\"d.corp\",\"4\",\"Log4Shell\",\"CVE-2021-44228\"\n",
    );

    let mut source = CsvSource::new(file.path());
    let columns = source.detect(&ColumnPatterns::default()).unwrap();
    assert_eq!((columns.address, columns.identifier), (0, 4));

    let filter = AddressFilter::parse(FilterMode::Exclude, "192.168.0.0/16 # office").unwrap();
    let mut model = ScanModel::new().with_accept(filter.into_predicate());
    source.load(|_| {}, |ip, cve| model.add(ip, cve)).unwrap();

    assert_eq!(model.address_count(), 2);
    assert_eq!(model.pair_count(), 3);

    let (pairs, sizes) = parse_report(&render(&model));
    assert_eq!(sizes.len(), 2);
    assert_eq!(pairs["10.0.0.1"].len(), 2);
    assert!(pairs["172.16.0.4"].contains("CVE-2021-44228"));
    assert!(!pairs.contains_key("192.168.7.9"));
}

#[test]
fn include_filter_from_config() {
    let file = scan_file(
        "IP,CVE\n10.1.1.1,CVE-2020-0001\n11.1.1.1,CVE-2020-0002\nbogus,CVE-2020-0003\n",
    );
    let mut config = Config::default();
    config.filter.mode = FilterMode::Include;
    config.filter.networks = vec!["10.0.0.0/8".into()];

    let mut source = CsvSource::new(file.path());
    source.detect(&ColumnPatterns::default()).unwrap();
    let mut model = ScanModel::new().with_accept(config.address_filter().unwrap().into_predicate());
    source.load(|_| {}, |ip, cve| model.add(ip, cve)).unwrap();

    assert_eq!(model.address_count(), 1);
    assert!(model.identifiers("10.1.1.1").is_some());
}

#[test]
fn undetectable_source_fails_before_loading() {
    let file = scan_file("Host,Port\nweb,443\ndb,5432\n");
    let mut source = CsvSource::new(file.path());
    let err = source.detect(&ColumnPatterns::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Detection);
    assert!(source.columns().is_none());

    let err = source.load(|_| {}, |_, _| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precheck);
}

#[test]
fn latin1_titles_do_not_stop_ingestion() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        b"IP,Title,CVE\n\
          10.0.0.1,ok,CVE-2020-0001\n\
          10.0.0.2,Caf\xe9 flaw,CVE-2020-0002\n\
          10.0.0.2,R\xe9sum\xe9 leak,CVE-2020-0003\n",
    )
    .unwrap();
    file.flush().unwrap();

    let mut source = CsvSource::new(file.path());
    let columns = source.detect(&ColumnPatterns::default()).unwrap();
    assert_eq!((columns.address, columns.identifier), (0, 2));

    let mut model = ScanModel::new();
    source.load(|_| {}, |ip, cve| model.add(ip, cve)).unwrap();
    assert_eq!(model.address_count(), 2);
    assert_eq!(model.pair_count(), 3);
}

proptest! {
    #[test]
    fn report_preserves_pairs(
        observations in prop::collection::vec((0u8..8, 0u16..40), 0..300),
        max in 1usize..10,
    ) {
        let mut model = ScanModel::new().with_max_per_record(max);
        let mut expected: HashMap<String, HashSet<String>> = HashMap::new();
        for (host, id) in &observations {
            let ip = format!("10.0.0.{host}");
            let cve = format!("CVE-2020-{id:04}");
            model.add(&ip, &cve);
            expected.entry(ip).or_default().insert(cve);
        }

        let (pairs, sizes) = parse_report(&render(&model));
        prop_assert_eq!(pairs, expected);
        prop_assert!(sizes.iter().all(|&n| n >= 1 && n <= max));
    }
}
