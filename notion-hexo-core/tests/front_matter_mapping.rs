mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{column, id, PageBuilder};
use notion_hexo_core::front_matter::{render_sub_page_header, FrontMatter, RenderEnv};
use notion_hexo_core::model::ColumnType;
use notion_hexo_core::SchemaError;

fn env(default_url: &str) -> RenderEnv<'_> {
    RenderEnv {
        timezone: chrono_tz::UTC,
        default_url,
    }
}

#[test]
fn schema_names_are_normalized() {
    let mapping = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("tg", "Tags", ColumnType::MultiSelect),
        column("mu", "My URL", ColumnType::Text),
    ])
    .unwrap();
    assert_eq!(mapping.names().collect::<Vec<_>>(), vec!["my_url", "tags", "title"]);
}

#[test]
fn missing_custom_url_falls_back_to_the_computed_one() {
    let mapping = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("tg", "Tags", ColumnType::MultiSelect),
        column("mu", "My URL", ColumnType::Text),
    ])
    .unwrap();
    let page = PageBuilder::new(id(1), "Hello").prop("tg", json!([["rust,hexo"]])).build();

    let rendered = mapping.render(page.root(), &env("/00000000000000000000000000000001"));
    assert_eq!(
        rendered,
        "tags: [rust,hexo]\n\
         title: Hello\n\
         uuid: 00000000-0000-0000-0000-000000000001\n\
         url: /00000000000000000000000000000001\n"
    );
}

#[test]
fn declared_url_is_trimmed_and_replaces_the_system_url() {
    let mapping = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("u", "URL", ColumnType::Text),
    ])
    .unwrap();
    let page = PageBuilder::new(id(1), "Hello").prop("u", json!([["/2020/hello/"]])).build();
    let rendered = mapping.render(page.root(), &env("/default"));
    assert!(rendered.contains("url: 2020/hello\n"), "{rendered}");
    assert_eq!(rendered.matches("url:").count(), 1);

    let bare = PageBuilder::new(id(2), "Bare").build();
    let rendered = mapping.render(bare.root(), &env("/default"));
    assert!(rendered.contains("url: /default\n"), "{rendered}");
}

#[test]
fn typed_fields_render_per_type() {
    let mapping = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("ct", "Categories", ColumnType::MultiSelect),
        column("cm", "Comments", ColumnType::Checkbox),
        column("dt", "Date", ColumnType::Date),
        column("up", "Updated", ColumnType::LastEditedTime),
        column("ft", "Featured", ColumnType::Checkbox),
        column("rk", "Rank", ColumnType::Number),
    ])
    .unwrap();
    let page = PageBuilder::new(id(1), "Typed")
        .prop("ct", json!([["tech/go,life"]]))
        .prop("cm", json!([["Yes"]]))
        .prop("dt", json!([["‣", [["d", {"type": "date", "start_date": "2020-03-04", "start_time": "10:00"}]]]]))
        .prop("rk", json!([["3"]]))
        .build();

    let rendered = mapping.render(page.root(), &env("/x"));
    assert_eq!(
        rendered,
        "categories: [[tech,go],[life]]\n\
         comments: true\n\
         date: 2020-03-04 10:00\n\
         featured: false\n\
         rank: 3\n\
         title: Typed\n\
         updated: 2020-01-02T00:00:00+00:00\n\
         uuid: 00000000-0000-0000-0000-000000000001\n\
         url: /x\n"
    );
}

#[test]
fn text_columns_keep_only_the_first_run() {
    let mapping = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("ds", "Description", ColumnType::Text),
    ])
    .unwrap();
    let page = PageBuilder::new(id(1), "unused")
        .prop("title", json!([["Hello "], ["world", [["b"]]]]))
        .prop("ds", json!([["Short"], [" and long", [["i"]]]]))
        .build();
    let rendered = mapping.render(page.root(), &env("/x"));
    assert!(rendered.contains("title: Hello\n"), "{rendered}");
    assert!(rendered.contains("description: Short\n"), "{rendered}");
    assert!(!rendered.contains("world"), "{rendered}");
}

#[test]
fn undecodable_values_are_omitted() {
    let mapping = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("ds", "Description", ColumnType::Text),
    ])
    .unwrap();
    let page = PageBuilder::new(id(1), "Odd").prop("ds", json!({"not": "rich text"})).build();
    let rendered = mapping.render(page.root(), &env("/x"));
    assert!(!rendered.contains("description"), "{rendered}");
    assert!(rendered.starts_with("title: Odd\n"));
}

#[test]
fn title_column_is_required() {
    let err = FrontMatter::new(&[column("tg", "Tags", ColumnType::MultiSelect)]).unwrap_err();
    assert_eq!(err, SchemaError::MissingColumn("title"));

    let err = FrontMatter::new(&[column("title", "Title", ColumnType::Text)]).unwrap_err();
    assert!(matches!(err, SchemaError::WrongType { ref name, .. } if name == "title"));
}

#[test]
fn known_names_must_have_a_compatible_type() {
    let err = FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("tg", "Tags", ColumnType::Select),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        SchemaError::WrongType {
            name: "tags".into(),
            found: ColumnType::Select,
            expected: vec![ColumnType::MultiSelect],
        }
    );

    FrontMatter::new(&[
        column("title", "Title", ColumnType::Title),
        column("dt", "Date", ColumnType::CreatedTime),
        column("up", "Updated", ColumnType::Date),
    ])
    .expect("created and edited times are valid date sources");
}

#[test]
fn reserved_names_are_rejected() {
    for name in ["ID", "uuid", "Post Title", "permalink", "filename"] {
        let err = FrontMatter::new(&[
            column("title", "Title", ColumnType::Title),
            column("x", name, ColumnType::Text),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::ReservedName(_)), "{name}: {err:?}");
    }
}

#[test]
fn sub_pages_get_a_minimal_header() {
    let page = PageBuilder::new(id(5), "Notes").build();
    assert_eq!(
        render_sub_page_header(page.root(), chrono_tz::Europe::Amsterdam),
        "title: Notes\n\
         date: 2020-01-01T01:00:00+01:00\n\
         updated: 2020-01-02T01:00:00+01:00\n"
    );
}
