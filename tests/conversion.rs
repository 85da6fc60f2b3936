// ABOUTME: End-to-end conversion tests across the JSON, URL-encoded and multipart forms.
// ABOUTME: Exercises serializer round trips, the bracket-path codec and the byte escape.

use formbody::escape::{escape_bytes, unescape_bytes};
use formbody::qs;
use formbody::{
    convert, merge, nested, Form, FormFormat, FormSerializer, HeaderContext, MessageContext,
    MultiPartFormSerializer, NestedValue, UrlEncodedFormSerializer,
};

fn urlencoded_ctx() -> MessageContext {
    MessageContext::new(Some("application/x-www-form-urlencoded".to_owned()))
}

// Small deterministic byte stream for the binary-safety sweeps.
struct Lcg(u64);

impl Lcg {
    fn next_byte(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u8
    }

    fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_byte()).collect()
    }
}

#[test]
fn test_urlencoded_round_trip() {
    let serializer = UrlEncodedFormSerializer;
    let mut ctx = urlencoded_ctx();
    let form = serializer
        .deserialize(b"a%5Bb%5D=with%20space&plain=1&empty=", &ctx)
        .unwrap();
    let body = serializer.serialize(&form, &mut ctx).unwrap();
    assert_eq!(serializer.deserialize(&body, &ctx).unwrap(), form);
}

#[test]
fn test_json_round_trip() {
    let mut ctx = MessageContext::new(Some("application/json".to_owned()));
    let body = br#"{"user": {"name": "alice", "tags": ["a", "b"]}, "n": 5.0}"#;
    let form = FormFormat::Json.deserialize(body, &ctx).unwrap();
    let serialized = FormFormat::Json.serialize(&form, &mut ctx).unwrap();
    assert_eq!(FormFormat::Json.deserialize(&serialized, &ctx).unwrap(), form);
}

#[test]
fn test_multipart_round_trip() {
    let mut ctx = MessageContext::new(None);
    let pairs = vec![
        (b"field".to_vec(), Some(b"value".to_vec())),
        (b"raw".to_vec(), Some(vec![0x00, 0xff, 0x7f])),
    ];
    let form = FormFormat::Multipart.import_form(&pairs, &mut ctx).unwrap();
    let body = FormFormat::Multipart.serialize(&form, &mut ctx).unwrap();
    let reparsed = FormFormat::Multipart.deserialize(&body, &ctx).unwrap();
    assert_eq!(reparsed, form);
    assert_eq!(reparsed.export(), pairs);
}

#[test]
fn test_escape_round_trips_arbitrary_bytes() {
    let mut rng = Lcg(0x5eed);
    for len in [0, 1, 2, 16, 255, 1024, 4096] {
        let data = rng.bytes(len);
        let escaped = escape_bytes(&data);
        // Only printable ASCII plus the whitespace controls survive escaping.
        assert!(escaped
            .bytes()
            .all(|b| (0x20..0x7f).contains(&b) || matches!(b, 0x09..=0x0d)));
        assert_eq!(unescape_bytes(&escaped).unwrap(), data);
    }
}

#[test]
fn test_escape_round_trips_every_byte_value() {
    let all: Vec<u8> = (0..=255).collect();
    assert_eq!(unescape_bytes(&escape_bytes(&all)).unwrap(), all);
}

#[test]
fn test_bare_duplicate_overwrites() {
    let parsed = qs::parse_qs("a=1&a=2&a=3&a=4");
    assert_eq!(NestedValue::Map(parsed), nested!({"a": "4"}));
}

#[test]
fn test_bracket_array_accumulates() {
    let parsed = qs::parse_qs("a[]=1&a[]=2&a[]=3&a[]=4");
    assert_eq!(
        NestedValue::Map(parsed),
        nested!({"a": ["1", "2", "3", "4"]})
    );
}

#[test]
fn test_mixed_key_coercion() {
    let merged = merge(
        nested!({"0": "nest", "key6": "deep"}),
        nested!(["along"]),
    );
    assert_eq!(merged, nested!({"0": "nest", "key6": "deep", "1": "along"}));
}

#[test]
fn test_deep_merge_precedence() {
    let merged = merge(
        nested!({"a": "1", "b": {"c": "2"}}),
        nested!({"a": "3", "b": {"d": "4"}}),
    );
    assert_eq!(merged, nested!({"a": "1", "b": {"c": "2", "d": "4"}}));
}

#[test]
fn test_cross_format_equivalence() {
    let mut ctx = MessageContext::new(Some("application/json".to_owned()));
    let json = FormFormat::Json
        .deserialize(br#"{"key1": [1, 2, 3, 4, 5.0], "key2": "2"}"#, &ctx)
        .unwrap();
    let urlencoded = convert(&json, FormFormat::UrlEncoded, &mut ctx).unwrap();
    let body = FormFormat::UrlEncoded.serialize(&urlencoded, &mut ctx).unwrap();
    assert_eq!(
        body,
        b"key1[]=1&key1[]=2&key1[]=3&key1[]=4&key1[]=5.0&key2=2"
    );
}

#[test]
fn test_nested_complex_parse() {
    let parsed = qs::parse_qs(
        "key1[key2][key3][key4][]=ho\
         &key1[key2][key3][key4][]=hey\
         &key1[key2][key3][key4][]=choco\
         &key1[key2][key3][key4][key5][]=nest\
         &key1[key2][key3][key4][key5][key6]=deep\
         &key1[key2][key3][key4][key5][]=along\
         &key1[key2][key3][key4][key5][key5_1]=hello",
    );
    let expected = nested!({
        "key1": {
            "key2": {
                "key3": {
                    "key4": {
                        "0": "ho",
                        "1": "hey",
                        "2": "choco",
                        "key5": {
                            "0": "nest",
                            "key6": "deep",
                            "1": "along",
                            "key5_1": "hello"
                        }
                    }
                }
            }
        }
    });
    assert_eq!(NestedValue::Map(parsed), expected);
}

#[test]
fn test_multipart_json_symmetry() {
    let mut ctx = MessageContext::new(None);
    let pairs = vec![
        (b"user[name]".to_vec(), Some(b"alice".to_vec())),
        (b"user[tags][]".to_vec(), Some(b"a".to_vec())),
        (b"user[tags][]".to_vec(), Some(b"b".to_vec())),
        (b"blob".to_vec(), Some(vec![0xde, 0xad, 0xbe, 0xef])),
    ];
    let multipart = FormFormat::Multipart.import_form(&pairs, &mut ctx).unwrap();
    let exported = multipart.export();
    assert_eq!(exported, pairs);

    let json = FormFormat::Json.import_form(&exported, &mut ctx).unwrap();
    assert_eq!(json.export(), exported);

    let back = convert(&json, FormFormat::Multipart, &mut ctx).unwrap();
    assert_eq!(back.export(), exported);
}

#[test]
fn test_convert_json_to_urlencoded_and_back() {
    let mut ctx = MessageContext::new(Some("application/json".to_owned()));
    let json = FormFormat::Json
        .deserialize(br#"{"a": {"b": "1", "c": ["x", "y"]}, "d": "2"}"#, &ctx)
        .unwrap();
    let urlencoded = convert(&json, FormFormat::UrlEncoded, &mut ctx).unwrap();
    let back = convert(&urlencoded, FormFormat::Json, &mut ctx).unwrap();
    assert_eq!(back, json);
}

#[test]
fn test_convert_to_multipart_installs_boundary() {
    let mut ctx = urlencoded_ctx();
    let form = FormFormat::UrlEncoded.deserialize(b"k=v", &ctx).unwrap();
    let multipart = convert(&form, FormFormat::Multipart, &mut ctx).unwrap();
    let content_type = ctx.content_type().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    // The installed boundary is the one the body serializes with.
    let body = FormFormat::Multipart.serialize(&multipart, &mut ctx).unwrap();
    let Form::Multipart(inner) = &multipart else { panic!() };
    let delimiter = [b"--".as_slice(), &inner.boundary().unwrap()].concat();
    assert!(body.starts_with(&delimiter));
}

#[test]
fn test_multipart_requires_boundary_to_serialize() {
    let serializer = MultiPartFormSerializer;
    let mut ctx = MessageContext::new(None);
    let form = serializer.get_empty_form(&mut ctx).unwrap();
    // get_empty_form installed a default content type with a boundary.
    assert!(ctx.content_type().is_some());
    assert!(serializer.serialize(&form, &mut ctx).is_ok());
}

#[test]
fn test_unsupported_content_type_is_an_error() {
    assert!(FormFormat::from_content_type("text/plain").is_err());
    assert_eq!(
        FormFormat::from_content_type_or("text/plain", FormFormat::UrlEncoded),
        FormFormat::UrlEncoded
    );
}

#[test]
fn test_binary_values_survive_json_conversion() {
    let mut rng = Lcg(0xbeef);
    let blob = rng.bytes(64);
    let pairs = vec![(b"file".to_vec(), Some(blob))];
    let mut ctx = MessageContext::new(None);
    let json = FormFormat::Json.import_form(&pairs, &mut ctx).unwrap();
    // The JSON text itself is pure ASCII even though the payload is not.
    let body = FormFormat::Json.serialize(&json, &mut ctx).unwrap();
    assert!(body.is_ascii());
    assert_eq!(json.export(), pairs);
}
