// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signers — turn an assembled document into its final byte stream.
//
// Cryptographic signing and key custody live outside this crate; callers
// plug their own implementation in through the `Signer` trait.

use std::io::Write;

use lopdf::{Document, Object, ObjectId};
use pagemark_core::error::{PagemarkError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// `/Info` key holding the fingerprint written by [`FingerprintSigner`].
pub const FINGERPRINT_KEY: &str = "PagemarkFingerprint";

/// Finalises an assembled document into `sink`.
pub trait Signer: Send + Sync {
    fn sign(&self, document: &mut Document, sink: &mut dyn Write) -> Result<()>;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn sign(&self, document: &mut Document, sink: &mut dyn Write) -> Result<()> {
        (**self).sign(document, sink)
    }
}

/// Serialises the document unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedSigner;

impl Signer for UnsignedSigner {
    #[instrument(skip_all)]
    fn sign(&self, document: &mut Document, sink: &mut dyn Write) -> Result<()> {
        write_document(document, sink)
    }
}

/// Stamps a SHA-256 fingerprint of the page content into `/Info`, then
/// serialises the document.
///
/// This is an integrity seal, not a signature: anyone can recompute it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintSigner;

impl Signer for FingerprintSigner {
    #[instrument(skip_all)]
    fn sign(&self, document: &mut Document, sink: &mut dyn Write) -> Result<()> {
        let fingerprint = content_fingerprint(document)?;
        set_info_entry(document, FINGERPRINT_KEY, &fingerprint)?;
        info!(%fingerprint, "Document fingerprinted");
        write_document(document, sink)
    }
}

/// Check a serialised document against the fingerprint stored in its
/// `/Info` dictionary.
pub fn verify_fingerprint(pdf: &[u8]) -> Result<()> {
    let document = Document::load_mem(pdf)
        .map_err(|err| PagemarkError::Signing(format!("unreadable document: {err}")))?;

    let expected = info_dictionary(&document)
        .and_then(|info| info.get(FINGERPRINT_KEY.as_bytes()).ok())
        .and_then(|value| value.as_str().ok())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .ok_or_else(|| PagemarkError::Signing("document carries no fingerprint".into()))?;

    let actual = content_fingerprint(&document)?;
    if actual == expected {
        Ok(())
    } else {
        Err(PagemarkError::Signing(format!(
            "fingerprint mismatch: expected {expected}, got {actual}"
        )))
    }
}

/// Hash of every page's content stream followed by the raw bytes of the
/// image XObjects it references, pages in order.
fn content_fingerprint(document: &Document) -> Result<String> {
    let mut hasher = Sha256::new();

    for (number, page_id) in document.get_pages() {
        let content = document
            .get_page_content(page_id)
            .map_err(|err| PagemarkError::Signing(format!("page {number} content: {err}")))?;
        hasher.update(&content);

        for image_id in page_image_ids(document, page_id) {
            if let Ok(Object::Stream(stream)) = document.get_object(image_id) {
                hasher.update(&stream.content);
            }
        }
    }

    let digest = hex::encode(hasher.finalize());
    debug!(%digest, "Content fingerprint computed");
    Ok(format!("sha256:{digest}"))
}

fn page_image_ids(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = document.get_dictionary(page_id) else {
        return Vec::new();
    };
    let resources = match page.get(b"Resources") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let xobjects = resources.and_then(|r| match r.get(b"XObject") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    });

    xobjects
        .map(|dict| {
            dict.iter()
                .filter_map(|(_, value)| value.as_reference().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn info_dictionary(document: &Document) -> Option<&lopdf::Dictionary> {
    let id = document.trailer.get(b"Info").ok()?.as_reference().ok()?;
    document.get_dictionary(id).ok()
}

fn set_info_entry(document: &mut Document, key: &str, value: &str) -> Result<()> {
    let info_id = match document.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) => id,
        Err(_) => {
            let id = document.add_object(lopdf::Dictionary::new());
            document.trailer.set("Info", id);
            id
        }
    };
    let info = document
        .get_object_mut(info_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| PagemarkError::Signing(format!("/Info is not a dictionary: {err}")))?;
    info.set(key, Object::string_literal(value));
    Ok(())
}

fn write_document(document: &mut Document, mut sink: &mut dyn Write) -> Result<()> {
    document
        .save_to(&mut sink)
        .map_err(|err| PagemarkError::Signing(format!("failed to serialise document: {err}")))?;
    Ok(())
}
