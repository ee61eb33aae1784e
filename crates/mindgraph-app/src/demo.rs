use serde_json::{Value, json};

/// Sample document shown on first start and by the demo action.
pub fn demo_document() -> Value {
    json!({
        "project": "JSON/YAML Mind Map Visualizer",
        "version": "2.0.0",
        "features": {
            "visualization": {
                "forceDirected": true,
                "dragAndDrop": true,
                "collapseExpand": true,
                "search": true
            },
            "export": {
                "svg": true,
                "png": true,
                "pdf": true,
                "json": true
            },
            "themes": {
                "light": true,
                "dark": true
            }
        },
        "statistics": {
            "totalNodes": 0,
            "maxDepth": 0,
            "dataSize": "0 KB"
        },
        "examples": [
            {
                "id": 1,
                "title": "Simple object",
                "data": {"name": "John", "age": 30, "city": "Moscow"}
            },
            {
                "id": 2,
                "title": "Nested structure",
                "data": {
                    "user": {
                        "profile": {
                            "personal": {"name": "Jane", "age": 25},
                            "preferences": {"theme": "dark", "language": "ru"}
                        },
                        "settings": {"notifications": true, "privacy": "public"}
                    }
                }
            }
        ]
    })
}

/// The demo document as pretty-printed input text.
pub fn demo_input() -> String {
    serde_json::to_string_pretty(&demo_document()).unwrap_or_default()
}
