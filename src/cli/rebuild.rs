//! Mode 5: rebuild into an importable uncompressed tablespace.

use std::path::PathBuf;

use crate::cli::resolve_input_path;
use crate::innodb::rebuild::{rebuild, RebuildOptions, RebuildStats};
use crate::IbdError;

pub struct RebuildCliOptions {
    pub input: String,
    pub output: String,
    pub sdi_json: Option<String>,
    pub target_sdi_json: Option<String>,
    pub index_id_map: Option<String>,
    pub cfg_out: Option<String>,
    pub use_target_sdi_root: bool,
    pub use_source_sdi_root: bool,
    pub target_sdi_root: Option<u32>,
    pub target_ibd: Option<String>,
    pub validate_remap: bool,
}

pub fn execute(opts: &RebuildCliOptions) -> Result<RebuildStats, IbdError> {
    if opts.use_source_sdi_root && opts.use_target_sdi_root {
        return Err(IbdError::Argument(
            "--use-source-sdi-root and --use-target-sdi-root are exclusive".to_string(),
        ));
    }

    let input = resolve_input_path(&opts.input);
    let rebuild_opts = RebuildOptions {
        sdi_json: opts.sdi_json.as_ref().map(PathBuf::from),
        target_sdi_json: opts.target_sdi_json.as_ref().map(PathBuf::from),
        index_id_map: opts.index_id_map.as_ref().map(PathBuf::from),
        cfg_out: opts.cfg_out.as_ref().map(PathBuf::from),
        use_target_sdi_root: opts.use_target_sdi_root,
        use_source_sdi_root: opts.use_source_sdi_root,
        target_sdi_root: opts.target_sdi_root,
        target_ibd: opts.target_ibd.as_ref().map(PathBuf::from),
        validate_remap: opts.validate_remap,
    };
    rebuild(input, &opts.output, &rebuild_opts)
}
