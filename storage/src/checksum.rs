use base64::prelude::*;

use crate::http::objects::Object;

/// Integrity check applied to transferred object data.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Validation {
    /// CRC32c, available for every object including composites.
    #[default]
    Crc32c,
    /// MD5, unavailable for composite objects.
    Md5,
    Disabled,
}

/// Base64 encoded digests of the bytes seen so far.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Digest {
    pub crc32c: Option<String>,
    pub md5: Option<String>,
}

/// Outcome of comparing a local digest with the server's.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Verdict {
    Valid,
    Mismatch,
    Md5NotAvailable,
}

/// Incremental hasher over a byte stream.
pub(crate) struct Hasher {
    validation: Validation,
    crc32c: u32,
    md5: md5::Context,
}

impl Hasher {
    pub fn new(validation: Validation) -> Self {
        Self {
            validation,
            crc32c: 0,
            md5: md5::Context::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self.validation {
            Validation::Crc32c => self.crc32c = crc32c::crc32c_append(self.crc32c, data),
            Validation::Md5 => self.md5.consume(data),
            Validation::Disabled => {}
        }
    }

    pub fn finish(self) -> Digest {
        match self.validation {
            Validation::Crc32c => Digest {
                crc32c: Some(BASE64_STANDARD.encode(self.crc32c.to_be_bytes())),
                md5: None,
            },
            Validation::Md5 => Digest {
                crc32c: None,
                md5: Some(BASE64_STANDARD.encode(self.md5.compute().0)),
            },
            Validation::Disabled => Digest::default(),
        }
    }
}

/// Compares `local` against the hashes the server reports for `remote`.
///
/// A requested hash the server does not report counts as a mismatch, except for
/// MD5 which is reported separately since composite objects never carry one.
pub(crate) fn verify(validation: Validation, local: &Digest, remote: &Object) -> Verdict {
    let (local, server) = match validation {
        Validation::Disabled => return Verdict::Valid,
        Validation::Crc32c => (&local.crc32c, &remote.crc32c),
        Validation::Md5 => match &remote.md5_hash {
            None => return Verdict::Md5NotAvailable,
            server => (&local.md5, server),
        },
    };
    match (local, server) {
        (Some(local), Some(server)) if local == server => Verdict::Valid,
        _ => {
            tracing::debug!("checksum mismatch: local={:?} server={:?}", local, server);
            Verdict::Mismatch
        }
    }
}

#[cfg(test)]
mod test {
    use crate::checksum::{verify, Digest, Hasher, Validation, Verdict};
    use crate::http::objects::Object;

    fn hello_world() -> Object {
        Object {
            crc32c: Some("yZRlqg==".to_string()),
            md5_hash: Some("XrY7u+Ae7tCTyyK7j1rNww==".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_incremental_crc32c() {
        let mut hasher = Hasher::new(Validation::Crc32c);
        hasher.update(b"hello ");
        hasher.update(b"world");
        let digest = hasher.finish();
        assert_eq!(digest.crc32c.as_deref(), Some("yZRlqg=="));
        assert_eq!(digest.md5, None);
        assert_eq!(verify(Validation::Crc32c, &digest, &hello_world()), Verdict::Valid);
    }

    #[test]
    fn test_incremental_md5() {
        let mut hasher = Hasher::new(Validation::Md5);
        hasher.update(b"hello");
        hasher.update(b" world");
        let digest = hasher.finish();
        assert_eq!(digest.md5.as_deref(), Some("XrY7u+Ae7tCTyyK7j1rNww=="));
        assert_eq!(verify(Validation::Md5, &digest, &hello_world()), Verdict::Valid);
    }

    #[test]
    fn test_verify_failures() {
        let mut hasher = Hasher::new(Validation::Crc32c);
        hasher.update(b"hello there");
        let digest = hasher.finish();
        assert_eq!(verify(Validation::Crc32c, &digest, &hello_world()), Verdict::Mismatch);

        // requested hash absent on the server
        assert_eq!(verify(Validation::Crc32c, &digest, &Object::default()), Verdict::Mismatch);
        assert_eq!(
            verify(Validation::Md5, &Digest::default(), &Object::default()),
            Verdict::Md5NotAvailable
        );
        assert_eq!(verify(Validation::Disabled, &Digest::default(), &Object::default()), Verdict::Valid);
    }
}
