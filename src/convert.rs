use std::{any::TypeId, collections::HashMap, fmt::Display, rc::Rc, str::FromStr};

use crate::{error::ConversionError, PortValue, TypeInfo, Value, ValueType};

type ParseFn = Rc<dyn Fn(&str) -> Result<Value, String>>;

#[derive(Clone)]
struct Converter {
    name: String,
    parse: ParseFn,
}

/// Registry of text parsers keyed by target type.
///
/// There is no fallback: parsing into a type that has no registered parser
/// fails with [`ConversionError::Unregistered`].
#[derive(Clone)]
pub struct Converters {
    by_type: HashMap<TypeId, Converter>,
    by_name: HashMap<String, ValueType>,
}

fn from_str_parser<T>() -> ParseFn
where
    T: PortValue + FromStr,
    T::Err: Display,
{
    Rc::new(|s: &str| {
        s.trim()
            .parse::<T>()
            .map(PortValue::into_value)
            .map_err(|e| e.to_string())
    })
}

fn parse_bool(s: &str) -> Result<Value, String> {
    match s.trim() {
        "true" | "True" | "TRUE" | "1" => Ok(Value::Bool(true)),
        "false" | "False" | "FALSE" | "0" => Ok(Value::Bool(false)),
        other => Err(format!("{other:?} is not a boolean")),
    }
}

impl Default for Converters {
    fn default() -> Self {
        let mut ret = Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        };
        ret.insert::<bool>("bool", Rc::new(parse_bool));
        ret.insert::<i64>("int", from_str_parser::<i64>());
        macro_rules! int_aliases {
            ($($ty:ty),*) => {
                $(ret.insert_type_only::<$ty>(stringify!($ty), from_str_parser::<$ty>());)*
            };
        }
        int_aliases!(i8, i16, i32, u8, u16, u32, u64, usize, isize);
        ret.insert::<f64>("float", from_str_parser::<f64>());
        ret.insert_type_only::<f32>("f32", from_str_parser::<f32>());
        ret.insert::<String>("string", Rc::new(|s: &str| Ok(Value::Str(s.to_owned()))));
        ret
    }
}

impl Converters {
    fn insert<T: PortValue>(&mut self, name: &str, parse: ParseFn) {
        self.by_name.insert(name.to_owned(), T::value_type());
        self.insert_type_only::<T>(name, parse);
    }

    fn insert_type_only<T: PortValue>(&mut self, name: &str, parse: ParseFn) {
        self.by_type.insert(
            TypeId::of::<T>(),
            Converter {
                name: name.to_owned(),
                parse,
            },
        );
    }

    /// Registers a parser for a user type. `name` is the type name usable in
    /// tree source port declarations.
    pub fn register<T, F>(&mut self, name: &str, parse: F)
    where
        T: PortValue,
        F: Fn(&str) -> Result<T, String> + 'static,
    {
        self.insert::<T>(name, Rc::new(move |s: &str| parse(s).map(PortValue::into_value)));
    }

    /// Looks up a type by the name it was registered with.
    pub fn value_type_by_name(&self, name: &str) -> Option<ValueType> {
        self.by_name.get(name).copied()
    }

    fn converter_for(&self, ty: ValueType) -> Option<&Converter> {
        let id = match ty {
            ValueType::Bool => TypeId::of::<bool>(),
            ValueType::Int => TypeId::of::<i64>(),
            ValueType::Float => TypeId::of::<f64>(),
            ValueType::Str => TypeId::of::<String>(),
            ValueType::Custom(info) => info.id(),
        };
        self.by_type.get(&id)
    }

    /// Parses `text` into a value of the given type.
    pub fn parse_value(&self, ty: ValueType, text: &str) -> Result<Value, ConversionError> {
        let converter = self
            .converter_for(ty)
            .ok_or_else(|| ConversionError::Unregistered {
                type_name: ty.name().to_owned(),
                text: text.to_owned(),
            })?;
        (converter.parse)(text).map_err(|reason| ConversionError::Invalid {
            type_name: converter.name.clone(),
            text: text.to_owned(),
            reason,
        })
    }

    /// Parses `text` into `T`, using the parser registered for exactly `T`.
    pub fn parse<T: PortValue>(&self, text: &str) -> Result<T, ConversionError> {
        let info = TypeInfo::of::<T>();
        let converter =
            self.by_type
                .get(&info.id())
                .ok_or_else(|| ConversionError::Unregistered {
                    type_name: info.name().to_owned(),
                    text: text.to_owned(),
                })?;
        let invalid = |reason: String| ConversionError::Invalid {
            type_name: converter.name.clone(),
            text: text.to_owned(),
            reason,
        };
        let value = (converter.parse)(text).map_err(invalid)?;
        T::from_value(&value).ok_or_else(|| invalid(format!("parsed a {}", value.type_name())))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Position2D {
        x: f64,
        y: f64,
    }

    impl PortValue for Position2D {}

    fn parse_position(s: &str) -> Result<Position2D, String> {
        let parts: Vec<_> = s.split(';').collect();
        if parts.len() != 2 {
            return Err("invalid input".to_owned());
        }
        let x = parts[0].trim().parse().map_err(|e| format!("{e}"))?;
        let y = parts[1].trim().parse().map_err(|e| format!("{e}"))?;
        Ok(Position2D { x, y })
    }

    #[test]
    fn builtin_types() {
        let converters = Converters::default();
        assert_eq!(converters.parse::<i32>("42"), Ok(42));
        assert_eq!(converters.parse::<usize>(" 7 "), Ok(7));
        assert_eq!(converters.parse::<f64>("1.5"), Ok(1.5));
        assert_eq!(converters.parse::<bool>("true"), Ok(true));
        assert_eq!(converters.parse::<String>("hi"), Ok("hi".to_owned()));
    }

    #[test]
    fn invalid_text_names_type_and_text() {
        let converters = Converters::default();
        let err = converters.parse::<i32>("forty").unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Invalid { ref type_name, ref text, .. } if type_name == "i32" && text == "forty"
        ));
    }

    #[test]
    fn unregistered_user_type() {
        let converters = Converters::default();
        let err = converters.parse::<Position2D>("1;2").unwrap_err();
        assert!(matches!(err, ConversionError::Unregistered { ref text, .. } if text == "1;2"));
    }

    #[test]
    fn registered_user_type() {
        let mut converters = Converters::default();
        converters.register("Position2D", parse_position);
        assert_eq!(
            converters.parse::<Position2D>("-1;3"),
            Ok(Position2D { x: -1., y: 3. })
        );
        let ty = converters.value_type_by_name("Position2D").unwrap();
        let value = converters.parse_value(ty, "1.1;2.3").unwrap();
        assert_eq!(value.get::<Position2D>(), Some(Position2D { x: 1.1, y: 2.3 }));
    }
}
