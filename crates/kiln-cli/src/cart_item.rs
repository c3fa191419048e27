use std::path::PathBuf;
use std::str::FromStr;

/// A cart line given on the command line as `TYPE[xN][@PATH]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub type_id: String,
    pub quantity: u32,
    pub path: Option<PathBuf>,
}

impl FromStr for CartItem {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (head, path) = match raw.split_once('@') {
            Some((head, path)) if !path.is_empty() => (head, Some(PathBuf::from(path))),
            Some(_) => return Err(format!("missing path after '@' in {raw:?}")),
            None => (raw, None),
        };
        let (type_id, quantity) = match head.rsplit_once('x') {
            Some((type_id, count)) if !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()) => {
                let quantity: u32 = count
                    .parse()
                    .map_err(|_| format!("quantity out of range in {raw:?}"))?;
                (type_id, quantity)
            }
            _ => (head, 1),
        };
        if type_id.is_empty() {
            return Err(format!("missing type in {raw:?}"));
        }
        if quantity == 0 {
            return Err(format!("quantity must be at least 1 in {raw:?}"));
        }
        Ok(Self {
            type_id: type_id.to_string(),
            quantity,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_quantity_and_path() {
        let item: CartItem = "kiln.stock.Palettex3@art/Warm.asset".parse().unwrap();
        assert_eq!(
            item,
            CartItem {
                type_id: "kiln.stock.Palette".into(),
                quantity: 3,
                path: Some(PathBuf::from("art/Warm.asset")),
            }
        );
    }

    #[test]
    fn bare_type_defaults_to_one() {
        let item: CartItem = "game.Box".parse().unwrap();
        assert_eq!(item.type_id, "game.Box");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.path, None);
    }

    #[test]
    fn rejects_zero_and_empty_parts() {
        assert!("game.Boxx0".parse::<CartItem>().is_err());
        assert!("x2".parse::<CartItem>().is_err());
        assert!("game.Box@".parse::<CartItem>().is_err());
    }
}
