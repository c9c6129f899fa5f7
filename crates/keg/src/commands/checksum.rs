//! `keg checksum` -- compute the digest of a file.
//!
//! The output is the `algorithm:hex` form accepted in formula files.

use anyhow::{Context, Result};
use keg_core::checksum::{Checksum, HashAlgorithm};

use crate::cli::{AlgorithmArg, ChecksumArgs};
use crate::context::RuntimeContext;
use crate::output::output_json;

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sha1 => HashAlgorithm::Sha1,
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

/// Execute the `keg checksum` command.
pub fn run(ctx: &RuntimeContext, args: &ChecksumArgs) -> Result<()> {
    let checksum = Checksum::compute_file(args.algorithm.into(), &args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    if ctx.json {
        output_json(&serde_json::json!({
            "file": args.file.display().to_string(),
            "algorithm": checksum.algorithm(),
            "hex": checksum.hex(),
            "checksum": checksum,
        }));
    } else {
        println!("{checksum}  {}", args.file.display());
    }
    Ok(())
}
