//! シークレット生成
//!
//! どちらの関数もOSの暗号論的乱数源を使用する。

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// 接続文字列を壊さない文字のみで構成（@ # % / ? & を含まない）
const PASSWORD_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-.";

/// URLセーフなランダムパスワードを生成
pub fn generate_password(length: usize) -> String {
    (0..length)
        .map(|_| PASSWORD_CHARSET[OsRng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

/// `length` 文字の16進シークレットを生成
///
/// 奇数が指定された場合は切り捨てて偶数長になる。
pub fn generate_secret(length: usize) -> String {
    let mut bytes = vec![0u8; length / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
