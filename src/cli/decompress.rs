//! Mode 2: inflate compressible pages into a mixed-size copy.

use crate::cli::resolve_input_path;
use crate::innodb::pipeline::{Pipeline, TransformOptions, TransformStats};
use crate::IbdError;

pub struct DecompressOptions {
    pub input: String,
    pub output: String,
}

pub fn execute(opts: &DecompressOptions) -> Result<TransformStats, IbdError> {
    let input = resolve_input_path(&opts.input);
    let mut pipeline = Pipeline::open(input)?;
    pipeline.run_to_file(
        &opts.output,
        TransformOptions {
            decrypt: false,
            decompress: true,
        },
    )
}
