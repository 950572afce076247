//! # xmldbms
//!
//! Middleware for moving data between XML documents and relational databases.
//!
//! A map describes how element types, attributes and PCDATA correspond to
//! tables and columns. Maps are generated from a DTD (or a DDML schema
//! document), stored as XML map documents, and turned into `CREATE TABLE`
//! scripts for a chosen SQL dialect.
//!
//! ## Features
//!
//! - DTD and DDML parsing into a single schema model
//! - Object-relational map generation with generated keys and order columns
//! - Map document reading and writing
//! - SQL DDL and DML for several dialects
//! - Actions documents that select how stored elements are updated
//! - Data handlers over a pooled database connection
//! - Protection against oversized or deeply nested input
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmldbms::{DdlWriter, Dialect, DtdParser, MapFactory};
//!
//! let dtd = DtdParser::new().parse_file("orders.dtd")?;
//! let map = MapFactory::default().create_map(&dtd)?;
//! let sql = DdlWriter::new(Dialect::PostgreSql).to_string(&map)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and resources
pub mod namespaces;
pub mod names;
pub mod locations;
pub mod loaders;
pub mod catalog;
pub mod documents;

// Schemas and maps
pub mod dtd;
pub mod mapping;
pub mod sql;

// Runtime
pub mod actions;
pub mod datahandler;

// Tools
pub mod config;
pub mod exports;

pub use actions::{ActionCompiler, ActionKind, Actions};
pub use config::{GenerateMapConfig, Properties};
pub use datahandler::{CommitMode, Connection, DataHandler, Pool, Row, Value};
pub use dtd::{DdmlReader, Dtd, DtdParser};
pub use error::{Error, Result};
pub use exports::{export_map, ExportConfig};
pub use mapping::{Map, MapFactory, MapOptions, MapReader, MapWriter};
pub use sql::{DdlWriter, Dialect};

/// Version of the xmldbms library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Map document namespace
pub const MAP_NAMESPACE: &str = "http://www.xmlmiddleware.org/xmldbms/v2";

/// Actions document namespace
pub const ACTIONS_NAMESPACE: &str = "http://www.xmlmiddleware.org/xmldbms/actions";

/// DDML schema namespace
pub const DDML_NAMESPACE: &str = "http://www.purl.org/NET/ddml/v1";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
