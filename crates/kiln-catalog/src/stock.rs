use crate::{StaticProvider, TypeDefinition};

struct StockType {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    single_instance: bool,
    description: &'static str,
}

const STOCK_TYPES: &[StockType] = &[
    StockType {
        id: "kiln.stock.Palette",
        name: "Palette",
        category: "Art",
        single_instance: false,
        description: "Named colour swatches shared across materials",
    },
    StockType {
        id: "kiln.stock.LootTable",
        name: "LootTable",
        category: "Gameplay",
        single_instance: false,
        description: "Weighted drop table",
    },
    StockType {
        id: "kiln.stock.DialogueLine",
        name: "DialogueLine",
        category: "Narrative",
        single_instance: false,
        description: "Single line of localized dialogue",
    },
    StockType {
        id: "kiln.stock.InputBindings",
        name: "InputBindings",
        category: "Input",
        single_instance: false,
        description: "Action to key mapping profile",
    },
    StockType {
        id: "kiln.stock.ProjectSettings",
        name: "ProjectSettings",
        category: "Project",
        single_instance: true,
        description: "Project wide settings; at most one may exist",
    },
];

pub fn builtin_definitions() -> Vec<TypeDefinition> {
    STOCK_TYPES
        .iter()
        .map(|stock| TypeDefinition {
            single_instance: stock.single_instance,
            description: Some(stock.description.into()),
            ..TypeDefinition::creatable(stock.id, stock.name).with_category(stock.category)
        })
        .collect()
}

/// Provider serving the stock types that ship with Kiln.
pub fn builtin_provider() -> StaticProvider {
    StaticProvider::new(builtin_definitions())
}
