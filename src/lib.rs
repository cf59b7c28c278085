//! A mutable protobuf schema graph, dynamic message instances whose field
//! mutations honor oneof exclusivity and default-value elision, and a
//! wire-format encoder — byte-identical to the reference encoder for
//! well-formed inputs — with a reflective path and a precomputed-plan
//! "specialized" path over the same schema.
//!
//! ```
//! use protoschema::schema::{FieldKindDecl, FieldSpec, ParentId, RootMember, Rule, Schema};
//! use protoschema::wire::ScalarType;
//! use protoschema::{encoder, Instance, Value};
//!
//! let mut schema = Schema::new();
//! let m = schema.add_message(ParentId::Root, "M").unwrap();
//! let a = schema.new_field(FieldSpec::new("a", 1, FieldKindDecl::Scalar(ScalarType::Int32), Rule::Required));
//! schema.message_add_field(m, a).unwrap();
//!
//! let sealed = schema.seal().unwrap();
//! let ty = match sealed.get("M").unwrap() {
//!     RootMember::Message(m) => m,
//!     _ => unreachable!(),
//! };
//!
//! let mut instance = Instance::new(ty);
//! instance.set("a", Some(Value::I32(150))).unwrap();
//! assert_eq!(&encoder::encode(&instance).unwrap()[..], b"\x08\x96\x01");
//! ```

#![deny(missing_debug_implementations)]
#![allow(dead_code)]

pub mod encoder;
pub mod error;
mod instance;
pub mod schema;
pub mod wire;
pub mod writer;

pub use self::error::{EncodeError, Error};
pub use self::instance::{Instance, MapKey, Value};
