//! User components registered through the configuration: serializers,
//! deserializers and adapters taking over parts of a document.

use core::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jsonbind::core::de::DeserializationContext;
use jsonbind::core::error::Result;
use jsonbind::core::model::Bindable;
use jsonbind::core::generator::JsonGenerator;
use jsonbind::core::parser::{Event, JsonbParser};
use jsonbind::core::ser::SerializationContext;
use jsonbind::{
    bind_class, BindingType, Jsonb, JsonbAdapter, JsonbConfig, JsonbDeserializer, JsonbError,
    JsonbSerializer,
};

// -----------------------------------------------------------------------------
// Adapters

#[derive(Default, Debug, PartialEq)]
struct Secret {
    value: String,
}
bind_class!(Secret { value: String });

#[derive(Default, Debug, PartialEq)]
struct Vault {
    secret: Secret,
    id: i64,
}
bind_class!(Vault { secret: Secret, id: i64 });

/// Binds `Secret` as a prefixed string and counts each direction.
struct SecretAdapter {
    to_json_calls: AtomicUsize,
    from_json_calls: AtomicUsize,
}

impl SecretAdapter {
    fn new() -> Self {
        Self {
            to_json_calls: AtomicUsize::new(0),
            from_json_calls: AtomicUsize::new(0),
        }
    }
}

impl JsonbAdapter for SecretAdapter {
    fn original_type(&self) -> BindingType {
        BindingType::concrete::<Secret>()
    }

    fn adapted_type(&self) -> BindingType {
        BindingType::concrete::<String>()
    }

    fn to_json(&self, original: &dyn Any) -> Result<Box<dyn Any>> {
        self.to_json_calls.fetch_add(1, Ordering::Relaxed);
        let secret = original
            .downcast_ref::<Secret>()
            .ok_or_else(|| JsonbError::Internal("adapter input is not a Secret".to_string()))?;
        Ok(Box::new(format!("secret:{}", secret.value)))
    }

    fn from_json(&self, adapted: Box<dyn Any>) -> Result<Box<dyn Any>> {
        self.from_json_calls.fetch_add(1, Ordering::Relaxed);
        let text = adapted
            .downcast::<String>()
            .map_err(|_| JsonbError::Internal("adapter input is not a string".to_string()))?;
        let value = text
            .strip_prefix("secret:")
            .ok_or_else(|| JsonbError::Internal("missing `secret:` prefix".to_string()))?;
        Ok(Box::new(Secret {
            value: value.to_string(),
        }))
    }
}

#[test]
fn adapter_applies_exactly_once_per_direction() {
    let adapter = Arc::new(SecretAdapter::new());
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new().with_adapters([Arc::clone(&adapter) as Arc<dyn JsonbAdapter>]),
        )
        .build();

    let vault = Vault {
        secret: Secret {
            value: "hush".into(),
        },
        id: 9,
    };
    let text = jsonb.to_string(&vault).expect("serialize");
    assert_eq!(text, r#"{"secret":"secret:hush","id":9}"#);
    assert_eq!(adapter.to_json_calls.load(Ordering::Relaxed), 1);

    let back: Vault = jsonb.from_str(&text).expect("deserialize");
    assert_eq!(back, vault);
    assert_eq!(adapter.from_json_calls.load(Ordering::Relaxed), 1);
}

#[derive(Default, Debug, PartialEq)]
struct Flags {
    bits: Vec<bool>,
    name: String,
}
bind_class!(Flags { bits: Vec<bool>, name: String });

/// Binds `Vec<bool>` as an array of 0/1 numbers.
struct BitsAdapter;

impl JsonbAdapter for BitsAdapter {
    fn original_type(&self) -> BindingType {
        <Vec<bool> as Bindable>::binding()
    }

    fn adapted_type(&self) -> BindingType {
        <Vec<i64> as Bindable>::binding()
    }

    fn to_json(&self, original: &dyn Any) -> Result<Box<dyn Any>> {
        let bits = original
            .downcast_ref::<Vec<bool>>()
            .ok_or_else(|| JsonbError::Internal("adapter input is not a Vec<bool>".to_string()))?;
        Ok(Box::new(
            bits.iter().map(|&b| i64::from(b)).collect::<Vec<i64>>(),
        ))
    }

    fn from_json(&self, adapted: Box<dyn Any>) -> Result<Box<dyn Any>> {
        let numbers = adapted
            .downcast::<Vec<i64>>()
            .map_err(|_| JsonbError::Internal("adapter input is not a Vec<i64>".to_string()))?;
        Ok(Box::new(
            numbers.iter().map(|&n| n != 0).collect::<Vec<bool>>(),
        ))
    }
}

#[test]
fn adapter_over_a_parameterized_type_round_trips() {
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new().with_adapters([Arc::new(BitsAdapter) as Arc<dyn JsonbAdapter>]),
        )
        .build();
    jsonb.context().mapping().register::<Vec<i64>>();

    // The adapted value is a structure, so the adapter completes through
    // the item stack rather than from a finished scalar.
    let flags: Flags = jsonb
        .from_str(r#"{"bits":[1,0,1],"name":"m"}"#)
        .expect("deserialize");
    assert_eq!(flags.bits, vec![true, false, true]);
    assert_eq!(flags.name, "m");
    assert_eq!(
        jsonb.to_string(&flags).expect("serialize"),
        r#"{"bits":[1,0,1],"name":"m"}"#
    );
}

// -----------------------------------------------------------------------------
// User serializers

#[derive(Default, Debug, PartialEq)]
struct Cell {
    x: i64,
    y: i64,
}
bind_class!(Cell { x: i64, y: i64 });

#[derive(Default, Debug, PartialEq)]
struct Grid {
    cell: Cell,
    label: String,
}
bind_class!(Grid { cell: Cell, label: String });

/// Writes a cell as a compact `"x:y"` string.
struct CellSerializer;

impl JsonbSerializer for CellSerializer {
    fn bound_type(&self) -> BindingType {
        BindingType::concrete::<Cell>()
    }

    fn serialize(
        &self,
        value: &dyn Any,
        generator: &mut JsonGenerator,
        _ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let cell = value
            .downcast_ref::<Cell>()
            .ok_or_else(|| JsonbError::Internal("serializer input is not a Cell".to_string()))?;
        generator.write_string(&format!("{}:{}", cell.x, cell.y))
    }
}

/// Reads the `"x:y"` encoding back.
struct CellDeserializer;

impl JsonbDeserializer for CellDeserializer {
    fn bound_type(&self) -> BindingType {
        BindingType::concrete::<Cell>()
    }

    fn deserialize(
        &self,
        parser: &mut JsonbParser<'_>,
        _ctx: &mut DeserializationContext<'_>,
        _runtime_type: &BindingType,
    ) -> Result<Box<dyn Any>> {
        parser.move_to_value()?;
        let text = parser.string_value()?;
        let (x, y) = text
            .split_once(':')
            .ok_or_else(|| JsonbError::Internal(format!("not an `x:y` pair: {text:?}")))?;
        let parse = |part: &str| {
            part.parse::<i64>()
                .map_err(|e| JsonbError::Internal(format!("bad coordinate {part:?}: {e}")))
        };
        Ok(Box::new(Cell {
            x: parse(x)?,
            y: parse(y)?,
        }))
    }
}

#[test]
fn user_serializer_takes_over_a_value() {
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new()
                .with_serializers([Arc::new(CellSerializer) as Arc<dyn JsonbSerializer>]),
        )
        .build();

    let grid = Grid {
        cell: Cell { x: 4, y: 5 },
        label: "g".into(),
    };
    assert_eq!(
        jsonb.to_string(&grid).expect("serialize"),
        r#"{"cell":"4:5","label":"g"}"#
    );
    // Also applies at the document root.
    assert_eq!(
        jsonb.to_string(&Cell { x: 1, y: 2 }).expect("serialize"),
        r#""1:2""#
    );
}

#[test]
fn custom_encoding_round_trips() {
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new()
                .with_serializers([Arc::new(CellSerializer) as Arc<dyn JsonbSerializer>])
                .with_deserializers([Arc::new(CellDeserializer) as Arc<dyn JsonbDeserializer>]),
        )
        .build();

    let grid = Grid {
        cell: Cell { x: -3, y: 7 },
        label: "g".into(),
    };
    let text = jsonb.to_string(&grid).expect("serialize");
    let back: Grid = jsonb.from_str(&text).expect("deserialize");
    assert_eq!(back, grid);
}

// -----------------------------------------------------------------------------
// Delegation back into the engine

#[derive(Default, Debug, PartialEq)]
struct Pair {
    left: i64,
    right: i64,
}
bind_class!(Pair { left: i64, right: i64 });

/// Writes a pair as a two-element array, delegating the numbers back to the
/// engine.
struct PairSerializer;

impl JsonbSerializer for PairSerializer {
    fn bound_type(&self) -> BindingType {
        BindingType::concrete::<Pair>()
    }

    fn serialize(
        &self,
        value: &dyn Any,
        generator: &mut JsonGenerator,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<()> {
        let pair = value
            .downcast_ref::<Pair>()
            .ok_or_else(|| JsonbError::Internal("serializer input is not a Pair".to_string()))?;
        generator.write_start_array()?;
        ctx.serialize(&BindingType::concrete::<i64>(), &pair.left, generator)?;
        ctx.serialize(&BindingType::concrete::<i64>(), &pair.right, generator)?;
        generator.write_end()
    }
}

#[test]
fn user_serializer_can_delegate_to_the_engine() {
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new()
                .with_serializers([Arc::new(PairSerializer) as Arc<dyn JsonbSerializer>]),
        )
        .build();
    let pair = Pair { left: 10, right: 20 };
    assert_eq!(jsonb.to_string(&pair).expect("serialize"), "[10,20]");
}

// -----------------------------------------------------------------------------
// Parser re-synchronization after user deserializers

#[derive(Default, Debug, PartialEq)]
struct Span {
    start: i64,
    end: i64,
}
bind_class!(Span { start: i64, end: i64 });

#[derive(Default, Debug, PartialEq)]
struct Timeline {
    span: Span,
    label: String,
}
bind_class!(Timeline { span: Span, label: String });

/// Reads only the first property of its object and leaves the rest unread.
struct FirstKeyOnly;

impl JsonbDeserializer for FirstKeyOnly {
    fn bound_type(&self) -> BindingType {
        BindingType::concrete::<Span>()
    }

    fn deserialize(
        &self,
        parser: &mut JsonbParser<'_>,
        ctx: &mut DeserializationContext<'_>,
        _runtime_type: &BindingType,
    ) -> Result<Box<dyn Any>> {
        parser.move_to_start_structure()?;
        let mut span = Span::default();
        if parser.next()? == Event::KeyName && parser.string_value()? == "start" {
            let start = ctx.deserialize(&BindingType::concrete::<i64>(), parser)?;
            span.start = *start
                .downcast::<i64>()
                .map_err(|_| JsonbError::Internal("delegated value is not an i64".to_string()))?;
        }
        Ok(Box::new(span))
    }
}

#[test]
fn partially_consumed_subtrees_are_resynced() {
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new()
                .with_deserializers([Arc::new(FirstKeyOnly) as Arc<dyn JsonbDeserializer>]),
        )
        .build();

    // The deserializer stops after `start`; the engine must drain `junk`
    // and `end` and still bind the sibling property.
    let timeline: Timeline = jsonb
        .from_str(r#"{"span":{"start":3,"junk":{"deep":[1,2]},"end":9},"label":"t"}"#)
        .expect("deserialize");
    assert_eq!(timeline.span, Span { start: 3, end: 0 });
    assert_eq!(timeline.label, "t");
}

/// Returns a constant without touching the parser at all.
struct Stubbed;

impl JsonbDeserializer for Stubbed {
    fn bound_type(&self) -> BindingType {
        BindingType::concrete::<Span>()
    }

    fn deserialize(
        &self,
        _parser: &mut JsonbParser<'_>,
        _ctx: &mut DeserializationContext<'_>,
        _runtime_type: &BindingType,
    ) -> Result<Box<dyn Any>> {
        Ok(Box::new(Span { start: -1, end: -1 }))
    }
}

#[test]
fn untouched_subtrees_are_skipped() {
    let jsonb = Jsonb::builder()
        .with_config(
            JsonbConfig::new()
                .with_deserializers([Arc::new(Stubbed) as Arc<dyn JsonbDeserializer>]),
        )
        .build();

    let timeline: Timeline = jsonb
        .from_str(r#"{"span":{"start":1,"end":2},"label":"t"}"#)
        .expect("deserialize");
    assert_eq!(timeline.span, Span { start: -1, end: -1 });
    assert_eq!(timeline.label, "t");
}
