//! Operator updates for [`super::MemoryStore`]. Only `$set` is supported.

use crate::error::{Error, Result};
use bson::{Bson, Document};

// Server codes.
const FAILED_TO_PARSE: i32 = 9;
const PATH_NOT_VIABLE: i32 = 28;

/// Apply `update` to `doc` in place.
pub(crate) fn apply(doc: &mut Document, update: &Document) -> Result<()> {
    if update.is_empty() {
        return Err(Error::operation(Some(FAILED_TO_PARSE), "update document cannot be empty"));
    }

    for (op, arg) in update {
        if !op.starts_with('$') {
            return Err(Error::operation(
                Some(FAILED_TO_PARSE),
                "update document requires atomic operators",
            ));
        }
        let fields = arg.as_document().ok_or_else(|| {
            Error::operation(
                Some(FAILED_TO_PARSE),
                format!("modifier {op} expects a document"),
            )
        })?;

        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(doc, path, value.clone())?;
                }
            }
            other => {
                return Err(Error::operation(
                    Some(FAILED_TO_PARSE),
                    format!("unknown modifier: {other}"),
                ))
            }
        }
    }
    Ok(())
}

fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(Error::write(
                    Some(PATH_NOT_VIABLE),
                    format!("cannot create field {rest:?} in non-document element {head:?}"),
                )),
            }
        }
    }
}
