use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::bench::RunResult;
use crate::error::Error;

/// Writes the artifact: elapsed nanoseconds as a native-endian u64, followed by
/// every sample as a native-endian u32. No header.
///
/// A file that cannot be written in full is removed again.
pub fn write_artifact(path: &Path, result: &RunResult) -> Result<(), Error> {
    let f = File::create(path).map_err(|e| Error::Output(path.to_path_buf(), e))?;
    let mut out = BufWriter::new(f);
    let written = encode(result.elapsed_ns, result.samples.as_slice(), &mut out)
        .and_then(|()| out.flush());
    if let Err(e) = written {
        drop(out);
        let _ = fs::remove_file(path);
        return Err(Error::Output(path.to_path_buf(), e));
    }
    Ok(())
}

/// Size in bytes of the artifact for `iterations` samples.
#[cfg(test)]
pub(crate) fn artifact_len(iterations: usize) -> usize {
    8 + iterations * 4
}

fn encode(elapsed_ns: u64, samples: &[u32], out: &mut dyn Write) -> io::Result<()> {
    out.write_all(&elapsed_ns.to_ne_bytes())?;
    for sample in samples {
        out.write_all(&sample.to_ne_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;

    fn result_with(samples: &[u32], elapsed_ns: u64) -> RunResult {
        let mut buf = SampleBuffer::new(samples.len());
        buf.as_mut_slice().copy_from_slice(samples);
        RunResult {
            elapsed_ns,
            samples: buf,
        }
    }

    #[test]
    fn test_encode_layout() {
        let mut out = Vec::new();
        encode(0x0102030405060708, &[1, 0xdeadbeef], &mut out).unwrap();
        assert_eq!(out.len(), artifact_len(2));
        assert_eq!(&out[..8], &0x0102030405060708u64.to_ne_bytes());
        assert_eq!(&out[8..12], &1u32.to_ne_bytes());
        assert_eq!(&out[12..16], &0xdeadbeefu32.to_ne_bytes());
    }

    #[test]
    fn test_write_and_overwrite() {
        let path = std::env::temp_dir().join(format!(
            "ctxbench_artifact_{}.bin",
            std::process::id()
        ));
        write_artifact(&path, &result_with(&[5, 6, 7], 99)).unwrap();
        let first = fs::read(&path).unwrap();
        assert_eq!(first.len(), artifact_len(3));

        write_artifact(&path, &result_with(&[8, 9, 10], 1234)).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(second.len(), first.len());
        assert_eq!(&second[..8], &1234u64.to_ne_bytes());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_directory_target_fails() {
        let dir = std::env::temp_dir();
        let err = write_artifact(&dir, &result_with(&[1], 1)).err().unwrap();
        assert!(matches!(err, Error::Output(_, _)));
        assert_eq!(err.exit_code(), 1);
        assert!(dir.is_dir());
    }
}
