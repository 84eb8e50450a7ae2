//! The eight concrete scenarios, parameterised across dialect presets
//! where the scenario is dialect-agnostic in shape.

use indexmap::indexmap;
use sqlcraft_core::ddl::{add_index_query, AddIndexOptions, IndexField};
use sqlcraft_core::dialect::{Dialect, Generic};
use sqlcraft_core::model::{Attribute, StaticModel, TableRef};
use sqlcraft_core::mutation::{bulk_insert_query, insert_query, update_query, BulkInsertOptions, InsertOptions, Row, UpdateOptions};
use sqlcraft_core::select::{select_query, SelectOptions};
use sqlcraft_core::value::Scalar;
use sqlcraft_core::where_clause::{where_items_query, Condition, WhereContext};

// 1. selectQuery('users', {where: {id: 1}}) → SELECT * FROM "users" WHERE "users"."id" = 1;
#[test]
fn scenario_one_select_with_primary_key_where() {
    let d = Generic::default();
    let table = TableRef::Bare("users".into());
    let mut opts = SelectOptions::default();
    opts.where_ = Some(Condition::field("id", Condition::scalar(1i64)));
    let sql = select_query(&table, &opts, None, &d).unwrap();
    assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"users\".\"id\" = 1;");
}

// 2. whereItemsQuery({name: {$like: 'A%'}, age: {$gte: 18, $lt: 65}})
//    → "name" LIKE 'A%' AND ("age" >= 18 AND "age" < 65)
#[test]
fn scenario_two_combined_like_and_range() {
    let d = Generic::default();
    let ctx = WhereContext::bare(&d);

    let mut name_ops = indexmap::IndexMap::new();
    name_ops.insert("$like".to_string(), Condition::scalar(Scalar::Text("A%".into())));

    let mut age_ops = indexmap::IndexMap::new();
    age_ops.insert("$gte".to_string(), Condition::scalar(18i64));
    age_ops.insert("$lt".to_string(), Condition::scalar(65i64));

    let mut top = indexmap::IndexMap::new();
    top.insert("name".to_string(), Condition::Map(name_ops));
    top.insert("age".to_string(), Condition::Map(age_ops));

    let sql = where_items_query(&Condition::Map(top), &ctx, "AND").unwrap();
    assert_eq!(sql, "\"name\" LIKE 'A%' AND (\"age\" >= 18 AND \"age\" < 65)");
}

// 3. whereItemsQuery({$or: [{a: 1}, {b: 2}]}) → ("a" = 1 OR "b" = 2)
#[test]
fn scenario_three_or_combinator() {
    let d = Generic::default();
    let ctx = WhereContext::bare(&d);
    let cond = Condition::field(
        "$or",
        Condition::Seq(vec![
            Condition::field("a", Condition::scalar(1i64)),
            Condition::field("b", Condition::scalar(2i64)),
        ]),
    );
    let sql = where_items_query(&cond, &ctx, "AND").unwrap();
    assert_eq!(sql, "(\"a\" = 1 OR \"b\" = 2)");
}

// 4. whereItemsQuery({tags: {$in: []}}) → "tags" IN (NULL)
#[test]
fn scenario_four_empty_in_list_becomes_in_null() {
    let d = Generic::default();
    let ctx = WhereContext::bare(&d);
    let mut ops = indexmap::IndexMap::new();
    ops.insert("$in".to_string(), Condition::Seq(vec![]));
    let cond = Condition::field("tags", Condition::Map(ops));
    let sql = where_items_query(&cond, &ctx, "AND").unwrap();
    assert_eq!(sql, "\"tags\" IN (NULL)");
}

// 5. insertQuery('t', {id: null, name: 'x'}, {id: {autoIncrement: true}}, {})
//    with DEFAULT support → INSERT INTO "t" ("id","name") VALUES (DEFAULT,'x');
#[test]
fn scenario_five_null_autoincrement_uses_default() {
    struct DefaultCapableGeneric(sqlcraft_core::dialect::Capabilities);
    impl Dialect for DefaultCapableGeneric {
        fn name(&self) -> &'static str {
            "generic-default-capable"
        }
        fn identifier_open(&self) -> char {
            '"'
        }
        fn identifier_close(&self) -> char {
            '"'
        }
        fn capabilities(&self) -> &sqlcraft_core::dialect::Capabilities {
            &self.0
        }
    }

    let mut caps = *Generic::default().capabilities();
    caps.auto_increment.default_value = true;
    let d = DefaultCapableGeneric(caps);

    let mut model = StaticModel {
        name: "T".into(),
        table: TableRef::Bare("t".into()),
        primary_keys: vec!["id".into()],
        ..Default::default()
    };
    model.field_attributes.insert(
        "id".into(),
        Attribute {
            auto_increment: true,
            ..Attribute::default()
        },
    );

    let table = TableRef::Bare("t".into());
    let row: Row = indexmap! {
        "id".to_string() => Scalar::Null,
        "name".to_string() => Scalar::Text("x".into()),
    };
    let sql = insert_query(&table, &row, Some(&model), &InsertOptions::default(), &d).unwrap();
    assert_eq!(sql, "INSERT INTO \"t\" (\"id\",\"name\") VALUES (DEFAULT,'x');");
}

// 6. bulkInsertQuery('t', [{a:1}, {a:2, b:3}], {}) → INSERT INTO "t" ("a","b") VALUES (1,NULL),(2,3);
#[test]
fn scenario_six_bulk_insert_fills_missing_columns_with_null() {
    let d = Generic::default();
    let table = TableRef::Bare("t".into());
    let rows: Vec<Row> = vec![
        indexmap! { "a".to_string() => Scalar::Int(1) },
        indexmap! { "a".to_string() => Scalar::Int(2), "b".to_string() => Scalar::Int(3) },
    ];
    let sql = bulk_insert_query(&table, &rows, None, &BulkInsertOptions::default(), &d).unwrap();
    assert_eq!(sql, "INSERT INTO \"t\" (\"a\",\"b\") VALUES (1,NULL),(2,3);");
}

// 7. updateQuery('t', {}, {id:1}) → "" (no-op)
#[test]
fn scenario_seven_update_with_no_values_is_a_no_op() {
    let d = Generic::default();
    let table = TableRef::Bare("t".into());
    let values: Row = indexmap! {};
    let opts = UpdateOptions {
        where_: Some(Condition::field("id", Condition::scalar(1i64))),
        ..Default::default()
    };
    let sql = update_query(&table, &values, &opts, None, &d).unwrap();
    assert_eq!(sql, "");
}

// 8. addIndexQuery('users', ['email'], {unique: true}, 'users') with a
//    non-alter dialect → CREATE UNIQUE INDEX "users_email" ON "users" ("email")
#[test]
fn scenario_eight_add_unique_index() {
    let d = Generic::default();
    let fields = vec![IndexField::Name("email".into())];
    let opts = AddIndexOptions {
        unique: true,
        ..Default::default()
    };
    let sql = add_index_query("users", &fields, &opts, Some("users"), None, &d).unwrap();
    assert_eq!(sql, "CREATE UNIQUE INDEX \"users_email\" ON \"users\" (\"email\")");
}
