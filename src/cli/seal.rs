//! Offline sealing and verification of local files

use std::error::Error;
use std::fs;
use std::path::Path;

use base64::Engine;

use crate::core::hashing;
use crate::core::seal;

fn encode_file(path: &Path) -> Result<(String, u64), Box<dyn Error>> {
    let bytes = fs::read(path).map_err(|e| format!("Could not read {}: {e}", path.display()))?;
    let size = bytes.len() as u64;
    Ok((base64::engine::general_purpose::STANDARD.encode(bytes), size))
}

pub fn run_seal(path: &Path) -> Result<(), Box<dyn Error>> {
    let (data, size) = encode_file(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let sealed = seal::seal(&name, "", &data, size);
    let seal = &sealed.seal;

    println!("File:      {}", seal.filename);
    println!("Size:      {} bytes", seal.size);
    println!("Sealed at: {}", seal.timestamp.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
    println!("SHA-512:   {}", seal.digest);
    if seal.sealed {
        println!("✅ File already carried a Verum Omnis seal");
    }
    println!("{}", seal::create_marker(seal));
    Ok(())
}

pub fn run_verify(path: &Path, digest: &str) -> Result<(), Box<dyn Error>> {
    let digest = digest.trim().to_ascii_lowercase();
    if !hashing::is_digest(&digest) {
        eprintln!("❌ Expected a 128-character hex SHA-512 digest");
        std::process::exit(2);
    }

    let (data, _) = encode_file(path)?;
    if seal::verify(&data, &digest) {
        println!("✅ {} matches {}", path.display(), seal::abbreviate_digest(&digest));
        Ok(())
    } else {
        eprintln!(
            "❌ {} does not match {}",
            path.display(),
            seal::abbreviate_digest(&digest)
        );
        std::process::exit(1);
    }
}
