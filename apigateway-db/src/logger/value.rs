//! Bound parameter values and their log rendering.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub type ValueError = Box<dyn StdError + Send + Sync>;

/// A value that knows its own database representation.
///
/// `Ok(None)` means SQL `NULL`.
pub trait Valuer: fmt::Debug + Send + Sync {
    fn value(&self) -> Result<Option<BindValue>, ValueError>;
}

/// A bound statement parameter.
#[derive(Debug, Clone)]
pub enum BindValue {
    Time(DateTime<Utc>),
    Bytes(Vec<u8>),
    Valuer(Arc<dyn Valuer>),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Valuers returning valuers are unwrapped this many times at most.
const MAX_VALUER_DEPTH: usize = 8;

impl BindValue {
    pub fn valuer(v: impl Valuer + 'static) -> Self {
        BindValue::Valuer(Arc::new(v))
    }

    /// Render for substitution into logged SQL.
    ///
    /// Precedence: time, bytes, valuer, numeric/bool, everything else quoted.
    pub fn format_for_log(&self) -> String {
        match self {
            BindValue::Time(t) => format!("'{}'", t.format(TIME_FORMAT)),
            BindValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) if is_printable(s) => format!("'{}'", s),
                _ => "'<binary>'".to_string(),
            },
            BindValue::Valuer(_) => match self.resolve() {
                BindValue::Null => "NULL".to_string(),
                resolved => format!("'{}'", resolved.raw()),
            },
            BindValue::Int(n) => n.to_string(),
            BindValue::UInt(n) => n.to_string(),
            BindValue::Float(f) => f.to_string(),
            BindValue::Bool(b) => b.to_string(),
            BindValue::Text(s) => format!("'{}'", s),
            BindValue::Null => "NULL".to_string(),
        }
    }

    /// Follow valuer indirections down to a concrete value.
    ///
    /// Accessor errors and `None` collapse to [`BindValue::Null`].
    pub fn resolve(&self) -> BindValue {
        let mut current = self.clone();
        for _ in 0..MAX_VALUER_DEPTH {
            match current {
                BindValue::Valuer(v) => {
                    current = match v.value() {
                        Ok(Some(inner)) => inner,
                        Ok(None) | Err(_) => BindValue::Null,
                    }
                }
                concrete => return concrete,
            }
        }
        BindValue::Null
    }

    /// Unquoted string conversion.
    fn raw(&self) -> String {
        match self {
            BindValue::Time(t) => t.format(TIME_FORMAT).to_string(),
            BindValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            BindValue::Valuer(_) => self.resolve().raw(),
            BindValue::Int(n) => n.to_string(),
            BindValue::UInt(n) => n.to_string(),
            BindValue::Float(f) => f.to_string(),
            BindValue::Bool(b) => b.to_string(),
            BindValue::Text(s) => s.clone(),
            BindValue::Null => "NULL".to_string(),
        }
    }
}

/// Letters, marks, numbers, punctuation, symbols and the ASCII space.
///
/// Control, whitespace, format (Cf), private-use (Co) and noncharacter code
/// points are rejected. Other unassigned code points are accepted since
/// there is no Unicode table to check them against.
fn is_printable(s: &str) -> bool {
    s.chars().all(|c| {
        c == ' '
            || !(c.is_control()
                || c.is_whitespace()
                || is_format(c)
                || is_private_use(c)
                || is_noncharacter(c))
    })
}

fn is_format(c: char) -> bool {
    matches!(
        u32::from(c),
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x0890..=0x0891
            | 0x08E2
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0x110BD
            | 0x110CD
            | 0x13430..=0x1343F
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0xE0001
            | 0xE0020..=0xE007F
    )
}

fn is_private_use(c: char) -> bool {
    matches!(u32::from(c), 0xE000..=0xF8FF | 0xF0000..=0xFFFFD | 0x100000..=0x10FFFD)
}

fn is_noncharacter(c: char) -> bool {
    let cp = u32::from(c);
    (0xFDD0..=0xFDEF).contains(&cp) || cp & 0xFFFE == 0xFFFE
}

macro_rules! bind_from {
    ($variant:ident: $($ty:ty => $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for BindValue {
                fn from(v: $ty) -> Self {
                    BindValue::$variant($conv(v))
                }
            }
        )+
    };
}

bind_from!(Int: i8 => i64::from, i16 => i64::from, i32 => i64::from, i64 => std::convert::identity);
bind_from!(UInt: u8 => u64::from, u16 => u64::from, u32 => u64::from, u64 => std::convert::identity);
bind_from!(Float: f32 => f64::from, f64 => std::convert::identity);
bind_from!(Bool: bool => std::convert::identity);
bind_from!(Text: String => std::convert::identity, &str => str::to_string);
bind_from!(Bytes: Vec<u8> => std::convert::identity, &[u8] => <[u8]>::to_vec);
bind_from!(Time: DateTime<Utc> => std::convert::identity);

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(BindValue::Null)
    }
}
