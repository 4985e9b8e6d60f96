//! The JSON value codec.
//!
//! Values serialize to a small JSON vocabulary: scalars map to JSON
//! scalars, references and sequences to single-key wrapper objects holding
//! object-id strings. Which references are worth writing, and how an id
//! string maps back to a live object, are injected through the
//! [`JsonEmitter`] and [`JsonParser`] seams so the same codec serves the
//! dumper, the loader, and in-memory uses.

use serde_json::{json, Value as Json};

use crate::error::{CoreError, Result};
use crate::object::ObjRef;
use crate::seq::{Set, Tuple};
use crate::value::Val;

/// Decides which references appear in emitted JSON.
pub trait JsonEmitter {
    /// Whether `r` may be written as an id string.
    fn emit_ref(&self, r: &ObjRef) -> bool;
}

/// Maps persisted id strings back to live objects.
pub trait JsonParser {
    fn resolve(&self, id: &str) -> Result<ObjRef>;
}

/// Emitter admitting every reference. For in-memory serialization.
pub struct EmitAll;

impl JsonEmitter for EmitAll {
    fn emit_ref(&self, _r: &ObjRef) -> bool {
        true
    }
}

/// Encode a value. Non-emittable references degrade to JSON null (inside
/// sequences they are skipped instead).
pub fn val_to_json(val: &Val, em: &dyn JsonEmitter) -> Json {
    match val {
        Val::None => Json::Null,
        Val::Int(i) => json!(i),
        Val::String(s) => Json::String(s.as_str().to_string()),
        Val::Ref(r) => {
            if em.emit_ref(r) {
                json!({ "ref": r.id().to_string() })
            } else {
                Json::Null
            }
        }
        Val::ColoredRef { refr, color } => {
            if em.emit_ref(refr) && em.emit_ref(color) {
                json!({ "cref": refr.id().to_string(), "color": color.id().to_string() })
            } else {
                Json::Null
            }
        }
        Val::Set(s) => json!({ "set": id_array(s.refs(), em) }),
        Val::Tuple(t) => json!({ "tup": id_array(t.refs(), em) }),
    }
}

fn id_array(refs: &[ObjRef], em: &dyn JsonEmitter) -> Vec<Json> {
    refs.iter()
        .filter(|r| em.emit_ref(r))
        .map(|r| Json::String(r.id().to_string()))
        .collect()
}

/// Decode a value. Malformed shapes and unresolvable ids are errors.
pub fn val_from_json(json: &Json, parser: &dyn JsonParser) -> Result<Val> {
    match json {
        Json::Null => Ok(Val::None),
        Json::Number(n) => n
            .as_i64()
            .map(Val::Int)
            .ok_or_else(|| CoreError::BadJson {
                detail: format!("non-integer number {n}"),
            }),
        Json::String(s) => Ok(Val::string(s.as_str())),
        Json::Object(map) => {
            if let Some(id) = map.get("ref") {
                let r = parser.resolve(expect_id_str(id)?)?;
                Ok(Val::Ref(r))
            } else if let Some(id) = map.get("cref") {
                let color = map.get("color").ok_or_else(|| CoreError::BadJson {
                    detail: "cref without color".to_string(),
                })?;
                let refr = parser.resolve(expect_id_str(id)?)?;
                let color = parser.resolve(expect_id_str(color)?)?;
                Ok(Val::colored(refr, color))
            } else if let Some(elems) = map.get("set") {
                Ok(Val::from(Set::from_refs(ref_vec(elems, parser)?)))
            } else if let Some(elems) = map.get("tup") {
                Ok(Val::from(Tuple::from_refs(ref_vec(elems, parser)?)))
            } else {
                Err(CoreError::BadJson {
                    detail: format!("unrecognized value object with keys {:?}", keys(map)),
                })
            }
        }
        other => Err(CoreError::BadJson {
            detail: format!("unexpected json {other}"),
        }),
    }
}

fn expect_id_str(json: &Json) -> Result<&str> {
    json.as_str().ok_or_else(|| CoreError::BadJson {
        detail: format!("object id must be a string, got {json}"),
    })
}

fn ref_vec(json: &Json, parser: &dyn JsonParser) -> Result<Vec<ObjRef>> {
    let elems = json.as_array().ok_or_else(|| CoreError::BadJson {
        detail: format!("sequence elements must be an array, got {json}"),
    })?;
    elems
        .iter()
        .map(|e| parser.resolve(expect_id_str(e)?))
        .collect()
}

fn keys(map: &serde_json::Map<String, Json>) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use crate::registry::Registry;
    use melt_ident::PairId;

    fn roundtrip(reg: &Registry, v: &Val) -> Val {
        let json = val_to_json(v, &EmitAll);
        val_from_json(&json, reg).unwrap()
    }

    #[test]
    fn roundtrip_all_kinds() {
        let reg = Registry::new();
        let a = reg.create();
        let b = reg.create();
        let vals = [
            Val::None,
            Val::Int(-42),
            Val::string("héllo"),
            Val::Ref(a.clone()),
            Val::colored(a.clone(), b.clone()),
            Val::from(Set::from_refs(vec![a.clone(), b.clone(), a.clone()])),
            Val::from(Tuple::from_refs(vec![b.clone(), a.clone(), b.clone()])),
        ];
        for v in &vals {
            assert_eq!(&roundtrip(&reg, v), v, "kind {:?}", v.kind());
        }
    }

    #[test]
    fn scalars_encode_bare() {
        assert_eq!(val_to_json(&Val::None, &EmitAll), Json::Null);
        assert_eq!(val_to_json(&Val::Int(7), &EmitAll), json!(7));
        assert_eq!(val_to_json(&Val::string("x"), &EmitAll), json!("x"));
    }

    #[test]
    fn non_emittable_ref_degrades_to_null() {
        struct EmitNone;
        impl JsonEmitter for EmitNone {
            fn emit_ref(&self, _r: &ObjRef) -> bool {
                false
            }
        }
        let r = Object::new(PairId::random());
        assert_eq!(val_to_json(&Val::Ref(r.clone()), &EmitNone), Json::Null);
        assert_eq!(
            val_to_json(&Val::colored(r.clone(), r.clone()), &EmitNone),
            Json::Null
        );
        let set = Val::from(Set::from_refs(vec![r]));
        assert_eq!(val_to_json(&set, &EmitNone), json!({ "set": [] }));
    }

    #[test]
    fn set_encoding_is_sorted_unique() {
        let reg = Registry::new();
        let a = reg.create();
        let b = reg.create();
        let set = Val::from(Set::from_refs(vec![b.clone(), a.clone(), b.clone()]));
        let json = val_to_json(&set, &EmitAll);
        let ids: Vec<&str> = json["set"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e.as_str().unwrap())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        let reg = Registry::new();
        for bad in [
            json!(true),
            json!([1, 2]),
            json!(1.5),
            json!({ "frob": 1 }),
            json!({ "ref": 17 }),
            json!({ "cref": "__" }),
            json!({ "set": "not-an-array" }),
        ] {
            assert!(
                matches!(val_from_json(&bad, &reg), Err(CoreError::BadJson { .. })),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn unresolvable_id_is_an_error() {
        let reg = Registry::new();
        let ghost = PairId::random().to_string();
        let json = json!({ "ref": ghost });
        assert!(matches!(
            val_from_json(&json, &reg),
            Err(CoreError::UnresolvedId(_))
        ));
    }
}
