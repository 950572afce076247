//! Schema to map to DDL integration tests

use std::collections::HashSet;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use xmldbms::mapping::PropertyTarget;
use xmldbms::{DdlWriter, DdmlReader, Dialect, DtdParser, Map, MapFactory, MapOptions, MapReader, MapWriter};

fn data_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("data");
    path
}

fn orders_map() -> Map {
    let dtd = DtdParser::new()
        .parse_file(data_dir().join("orders.dtd"))
        .unwrap();
    MapFactory::default().create_map(&dtd).unwrap()
}

fn create_statements(sql: &str) -> usize {
    sql.lines().filter(|l| l.starts_with("CREATE TABLE ")).count()
}

#[test]
fn test_orders_dtd_map() {
    let map = orders_map();
    map.validate().unwrap();

    assert_eq!(
        map.tables.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Orders", "Order", "Line", "Part", "OrderComment"]
    );
    assert_eq!(
        map.table("Order").unwrap().columns.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["OrderPK", "OrdersFK", "number", "rush", "Customer", "Date"]
    );
    assert_eq!(map.root_class_maps().count(), 1);

    let order = map.class_map("Order").unwrap();
    assert_eq!(
        order.element_property("Customer").unwrap().target,
        PropertyTarget::Column("Customer".to_string())
    );
    assert!(order.related_class("Line").is_some());
}

#[test]
fn test_document_and_dtd_agree() {
    let xml = std::fs::read_to_string(data_dir().join("orders.xml")).unwrap();
    let location = xmldbms::locations::Location::path(data_dir().join("orders.xml"));
    let dtd = DtdParser::new().parse_document(&xml, Some(&location)).unwrap();
    let from_document = MapFactory::default().create_map(&dtd).unwrap();
    assert_eq!(from_document, orders_map());
}

#[test]
fn test_ddml_map() {
    let text = std::fs::read_to_string(data_dir().join("orders.ddml")).unwrap();
    let dtd = DdmlReader::new().read_str(&text).unwrap();
    let map = MapFactory::default().create_map(&dtd).unwrap();

    assert_eq!(
        map.tables.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Orders", "Order", "Line"]
    );
    assert_eq!(
        map.table("Line").unwrap().columns.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["LinePK", "OrderFK", "sku", "LinePCDATA"]
    );
    assert!(!map.table("Order").unwrap().column("number").unwrap().nullable);
}

#[test]
fn test_map_document_round_trip() {
    let map = orders_map();
    let text = MapWriter::new().write_to_string(&map).unwrap();
    assert!(text.contains(xmldbms::MAP_NAMESPACE));
    let read = MapReader::new().read_str(&text).unwrap();
    assert_eq!(read, map);
}

#[test]
fn test_ddl_every_dialect() {
    let map = orders_map();
    for dialect in Dialect::ALL {
        let sql = DdlWriter::new(dialect).to_string(&map).unwrap();
        assert_eq!(create_statements(&sql), map.tables.len(), "{}", dialect);
        assert!(sql.contains(&dialect.quote_identifier("OrderComment")), "{}", dialect);
        assert!(!sql.contains("ALTER TABLE"), "{}", dialect);
    }
}

#[test]
fn test_ddl_from_read_map_is_identical() {
    let map = orders_map();
    let text = MapWriter::new().write_to_string(&map).unwrap();
    let read = MapReader::new().read_str(&text).unwrap();

    let writer = DdlWriter::new(Dialect::PostgreSql);
    assert_eq!(writer.to_string(&read).unwrap(), writer.to_string(&map).unwrap());
}

/// Build an acyclic DTD: element `eN` may only contain elements with a
/// larger index.
fn dtd_text(shapes: &[(Vec<(usize, u8)>, bool, usize)]) -> String {
    let mut text = String::new();
    for (i, (children, pcdata, attributes)) in shapes.iter().enumerate() {
        let mut seen = HashSet::new();
        let refs: Vec<String> = children
            .iter()
            .map(|(offset, occurs)| (i + 1 + offset, *occurs))
            .filter(|(child, _)| *child < shapes.len() && seen.insert(*child))
            .map(|(child, occurs)| {
                let indicator = ["", "?", "*", "+"][occurs as usize % 4];
                format!("e{}{}", child, indicator)
            })
            .collect();

        let model = match (refs.is_empty(), pcdata) {
            (true, true) => "(#PCDATA)".to_string(),
            (true, false) => "EMPTY".to_string(),
            (false, true) => format!(
                "(#PCDATA | {})*",
                refs.iter()
                    .map(|r| r.trim_end_matches(['?', '*', '+']))
                    .collect::<Vec<_>>()
                    .join(" | ")
            ),
            (false, false) => format!("({})", refs.join(", ")),
        };
        text.push_str(&format!("<!ELEMENT e{} {}>\n", i, model));
        for a in 0..*attributes {
            let default = if a % 2 == 0 { "#REQUIRED" } else { "#IMPLIED" };
            text.push_str(&format!("<!ATTLIST e{} a{} CDATA {}>\n", i, a, default));
        }
    }
    text
}

fn element_shape() -> impl Strategy<Value = (Vec<(usize, u8)>, bool, usize)> {
    (
        proptest::collection::vec((0usize..4, 0u8..4), 0..3),
        any::<bool>(),
        0usize..3,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_generated_maps_are_consistent(shapes in proptest::collection::vec(element_shape(), 1..7)) {
        let text = dtd_text(&shapes);
        let dtd = DtdParser::new().parse_str(&text, None).unwrap();
        let options = MapOptions::default().with_order_columns(shapes.len() % 2 == 0);

        let map = MapFactory::new(options.clone()).create_map(&dtd).unwrap();
        prop_assert!(map.validate().is_ok());
        prop_assert_eq!(&map, &MapFactory::new(options).create_map(&dtd).unwrap());

        for table in map.tables.values() {
            for fk in &table.foreign_keys {
                prop_assert!(map.table(&fk.remote_table).is_some());
            }
        }

        let sql = DdlWriter::new(Dialect::Standard).to_string(&map).unwrap();
        prop_assert_eq!(create_statements(&sql), map.tables.len());

        let read = MapReader::new()
            .read_str(&MapWriter::new().write_to_string(&map).unwrap())
            .unwrap();
        prop_assert_eq!(read, map);
    }
}
