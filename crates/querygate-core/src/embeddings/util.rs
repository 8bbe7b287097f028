use sha2::{Digest, Sha256};

pub fn encode_vec_f64(v: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 8);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

pub fn decode_vec_f64(bytes: &[u8]) -> anyhow::Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        anyhow::bail!("invalid embedding blob size {}", bytes.len());
    }
    let mut v = Vec::with_capacity(bytes.len() / 8);
    for chunk in bytes.chunks_exact(8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        v.push(f64::from_le_bytes(buf));
    }
    Ok(v)
}

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Cosine similarity over the common prefix of `a` and `b`.
///
/// Empty input or a zero-norm side yields 0.0 rather than an error so that a
/// document without tokens simply scores nothing.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;

    for i in 0..len {
        let x = a[i];
        let y = b[i];
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_values() -> anyhow::Result<()> {
        let v = vec![0.1_f64, -0.2, 3.5];
        let out = decode_vec_f64(&encode_vec_f64(&v))?;
        assert_eq!(v, out);
        Ok(())
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(decode_vec_f64(&[0u8; 7]).is_err());
    }

    #[test]
    fn cosine_identical_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![0.3, -1.0, 2.5, 0.0];
        let b = vec![1.0, 0.5, -0.25, 4.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn cosine_of_empty_or_zero_is_zero() {
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
