//! clap definitions for the five processing modes.
//!
//! The original tool selected its mode with a leading `1`..`5`; those
//! spellings remain as subcommand aliases.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ibdp")]
#[command(about = "Offline InnoDB tablespace processor")]
#[command(version)]
pub struct Cli {
    /// Verbose parse traces (also enabled by IB_PARSER_DEBUG=1)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decrypt a tablespace using a Percona keyring file
    #[command(visible_alias = "1")]
    Decrypt {
        /// Master key id
        key_id: u32,
        /// Server UUID the master key is registered under
        server_uuid: String,
        /// Path to the keyring file
        keyring: String,
        /// Input tablespace
        input: String,
        /// Output tablespace
        output: String,
    },

    /// Inflate compressed INDEX/RTREE/SDI pages to 16 KiB
    ///
    /// Metadata pages keep their physical size, so the output mixes page
    /// sizes and cannot be imported; use `rebuild` for an importable file.
    #[command(visible_alias = "2")]
    Decompress {
        /// Input tablespace
        input: String,
        /// Output tablespace
        output: String,
    },

    /// Decode rows from a chosen index
    #[command(visible_alias = "3")]
    Parse {
        /// Input tablespace (uncompressed)
        input: String,
        /// SDI JSON describing the table (as `ibd2sdi` emits it)
        sdi_json: String,

        /// Index to read, by name or numeric id (default: PRIMARY)
        #[arg(long)]
        index: Option<String>,

        /// List the table's indexes and exit
        #[arg(long)]
        list_indexes: bool,

        /// Output format
        #[arg(long, default_value = "pipe")]
        format: String,

        /// Write rows to a file instead of stdout
        #[arg(long)]
        output: Option<String>,

        /// Prepend page_no, rec_offset and rec_deleted columns
        #[arg(long)]
        with_meta: bool,

        /// Byte cap per external value
        #[arg(long, default_value_t = 4_000_000)]
        lob_max_bytes: usize,

        /// Print ENUM/SET/YEAR values as their stored integers
        #[arg(long)]
        raw_integers: bool,

        /// Do not consult extent descriptors for free-page skipping
        #[arg(long)]
        skip_xdes: bool,
    },

    /// Decrypt, then inflate, in one pass
    #[command(visible_alias = "4")]
    DecryptDecompress {
        /// Master key id
        key_id: u32,
        /// Server UUID the master key is registered under
        server_uuid: String,
        /// Path to the keyring file
        keyring: String,
        /// Input tablespace
        input: String,
        /// Output tablespace
        output: String,
    },

    /// Rebuild a compressed tablespace into importable 16 KiB pages
    #[command(visible_alias = "5")]
    Rebuild {
        /// Input tablespace
        input: String,
        /// Output tablespace
        output: String,

        /// Source SDI JSON (default: extracted from the input file)
        #[arg(long)]
        sdi_json: Option<String>,

        /// Target table's SDI JSON, enables name-based index-id remapping
        #[arg(long)]
        target_sdi_json: Option<String>,

        /// Explicit index-id map file (`src=dst` per line)
        #[arg(long)]
        index_id_map: Option<String>,

        /// Write the matching import `.cfg` here
        #[arg(long)]
        cfg_out: Option<String>,

        /// On SDI-root conflict, place the rebuilt root at the target's page
        #[arg(long)]
        use_target_sdi_root: bool,

        /// On SDI-root conflict, keep the source root page (default)
        #[arg(long)]
        use_source_sdi_root: bool,

        /// Explicit SDI root page for the output
        #[arg(long)]
        target_sdi_root: Option<u32>,

        /// Target tablespace; its page 0 supplies the target SDI root
        #[arg(long)]
        target_ibd: Option<String>,

        /// Verify every remapped id exists in the target SDI
        #[arg(long)]
        validate_remap: bool,
    },
}
