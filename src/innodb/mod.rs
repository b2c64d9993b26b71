//! InnoDB on-disk format parsing and transformation.
//!
//! Types and functions for reading the structures MySQL 8's InnoDB engine
//! writes to `.ibd` files (page headers, FSP flags, SDI metadata, compact
//! records, LOB chains) and for transforming whole tablespaces (decrypt,
//! decompress, rebuild).
//!
//! Start with [`tablespace::Tablespace`] to open a file, then hand it to a
//! [`pipeline::Pipeline`] for one of the five processing modes.

pub mod cfg;
pub mod checksum;
pub mod compression;
pub mod constants;
pub mod decryption;
pub mod dtype;
pub mod encryption;
pub mod field_decode;
pub mod geometry;
pub mod jsonb;
pub mod keyring;
pub mod lob;
pub mod page;
pub mod page_types;
pub mod pipeline;
pub mod rebuild;
pub mod record;
pub mod row_writer;
pub mod schema;
pub mod sdi;
pub mod tablespace;
pub mod xdes;
