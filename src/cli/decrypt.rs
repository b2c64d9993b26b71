//! Modes 1 and 4: decrypt (and optionally inflate) a tablespace copy.

use crate::cli::resolve_input_path;
use crate::innodb::keyring::Keyring;
use crate::innodb::pipeline::{Pipeline, TransformOptions, TransformStats};
use crate::IbdError;

pub struct DecryptOptions {
    pub key_id: u32,
    pub server_uuid: String,
    pub keyring: String,
    pub input: String,
    pub output: String,
    /// Mode 4: inflate compressible pages after decrypting.
    pub decompress: bool,
}

pub fn execute(opts: &DecryptOptions) -> Result<TransformStats, IbdError> {
    let keyring = Keyring::load(&opts.keyring)?;
    let input = resolve_input_path(&opts.input);

    let mut pipeline = Pipeline::open(input)?.with_keyring(
        &keyring,
        &opts.server_uuid,
        opts.key_id,
    )?;
    pipeline.run_to_file(
        &opts.output,
        TransformOptions {
            decrypt: true,
            decompress: opts.decompress,
        },
    )
}
