use crate::error::ConfigurationError;
use crate::point::{Classification, PointRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    X,
    Y,
    Z,
    Intensity,
    ReturnNumber,
    Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn eval(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// Boolean expression over point attributes. Built in code or parsed from
/// the textual form (`"Classification == 7"`, `"Z > 50"`) at configuration
/// time.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    ClassEq(Classification),
    ClassIn(Vec<Classification>),
    Compare { attr: Attr, op: CmpOp, value: f64 },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn class_eq(classification: Classification) -> Self {
        Predicate::ClassEq(classification)
    }

    pub fn class_in(classes: impl IntoIterator<Item = Classification>) -> Self {
        Predicate::ClassIn(classes.into_iter().collect())
    }

    pub fn matches(&self, point: &PointRecord) -> bool {
        match self {
            Predicate::ClassEq(class) => point.classification == *class,
            Predicate::ClassIn(classes) => classes.contains(&point.classification),
            Predicate::Compare { attr, op, value } => {
                // Absent optional attributes never satisfy a comparison.
                let lhs = match attr {
                    Attr::X => Some(point.x),
                    Attr::Y => Some(point.y),
                    Attr::Z => Some(point.z),
                    Attr::Intensity => point.intensity.map(f64::from),
                    Attr::ReturnNumber => point.return_number.map(f64::from),
                    Attr::Classification => Some(f64::from(point.classification.code())),
                };
                match lhs {
                    Some(lhs) => op.eval(lhs, *value),
                    None => false,
                }
            }
            Predicate::All(parts) => parts.iter().all(|p| p.matches(point)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(point)),
        }
    }

    /// Parses a single `attribute op value` comparison. Fails fast with a
    /// ConfigurationError so malformed filters never reach execution.
    pub fn parse(expression: &str) -> Result<Self, ConfigurationError> {
        let malformed = |reason: &str| ConfigurationError::Predicate {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let tokens: Vec<&str> = expression.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(malformed("expected `attribute op value`"));
        }

        let attr = match tokens[0].to_ascii_lowercase().as_str() {
            "x" => Attr::X,
            "y" => Attr::Y,
            "z" | "elevation" => Attr::Z,
            "intensity" => Attr::Intensity,
            "returnnumber" | "return_number" => Attr::ReturnNumber,
            "classification" | "class" => Attr::Classification,
            _ => return Err(malformed("unknown attribute")),
        };

        let op = match tokens[1] {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => return Err(malformed("unknown comparison operator")),
        };

        let value: f64 = tokens[2]
            .parse()
            .map_err(|_| malformed("value is not numeric"))?;

        if attr == Attr::Classification {
            if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
                return Err(malformed("classification code must be an integer in 0..=255"));
            }
            let class = Classification::from_code(value as u8);
            match op {
                CmpOp::Eq => return Ok(Predicate::ClassEq(class)),
                CmpOp::Ne | CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {}
            }
        }

        Ok(Predicate::Compare { attr, op, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(z: f64, class: Classification) -> PointRecord {
        PointRecord::new(0.0, 0.0, z, class)
    }

    #[test]
    fn test_parse_classification_equality() {
        let pred = Predicate::parse("Classification == 7").unwrap();
        assert_eq!(pred, Predicate::ClassEq(Classification::LowNoise));
        assert!(pred.matches(&point(1.0, Classification::LowNoise)));
        assert!(!pred.matches(&point(1.0, Classification::Ground)));
    }

    #[test]
    fn test_parse_elevation_threshold() {
        let pred = Predicate::parse("Z > 50").unwrap();
        assert!(pred.matches(&point(50.1, Classification::HighVegetation)));
        assert!(!pred.matches(&point(50.0, Classification::HighVegetation)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Predicate::parse("Z >").is_err());
        assert!(Predicate::parse("Altitude > 50").is_err());
        assert!(Predicate::parse("Z >> 50").is_err());
        assert!(Predicate::parse("Z > fifty").is_err());
        assert!(Predicate::parse("Classification == 7.5").is_err());
    }

    #[test]
    fn test_combinators() {
        let pred = Predicate::All(vec![
            Predicate::parse("Z > 0").unwrap(),
            Predicate::class_in([Classification::LowNoise, Classification::HighNoise]),
        ]);
        assert!(pred.matches(&point(1.0, Classification::HighNoise)));
        assert!(!pred.matches(&point(-1.0, Classification::HighNoise)));
        assert!(!pred.matches(&point(1.0, Classification::Ground)));
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let pred = Predicate::parse("Intensity >= 100").unwrap();
        assert!(!pred.matches(&point(0.0, Classification::Ground)));

        let mut p = point(0.0, Classification::Ground);
        p.intensity = Some(200);
        assert!(pred.matches(&p));
    }
}
