use std::cell::Cell;
use std::fmt;

use filters::{FilterArgs, FilterError, Object, StandardFilter, Value, apply_filter};

fn apply(name: &str, value: impl Into<Value>, args: Vec<Value>) -> Result<Value, FilterError> {
    apply_filter(name, &value.into(), &FilterArgs::new(args)).expect("filter should exist")
}

fn render(name: &str, value: impl Into<Value>, args: Vec<Value>) -> String {
    apply(name, value, args)
        .expect("filter should succeed")
        .to_string()
}

fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

#[derive(Debug, Default)]
struct Thing {
    prepared: Cell<i64>,
}

impl Object for Thing {
    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn call_method(&self, name: &str) -> Option<Value> {
        (name == "whatever").then(|| Value::Str(format!("woot: {}", self.prepared.get())))
    }

    fn prepare(&self) {
        self.prepared.set(self.prepared.get() + 1);
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "woot: {}", self.prepared.get())
    }
}

#[derive(Debug)]
struct TestDrop;

impl Object for TestDrop {
    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn call_method(&self, name: &str) -> Option<Value> {
        (name == "test").then(|| Value::from("testfoo"))
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("drop")
    }
}

#[test]
fn filter_names_round_trip_through_lookup() {
    for filter in StandardFilter::all() {
        assert_eq!(StandardFilter::from_name(filter.name()), Some(*filter));
    }
    assert_eq!(
        StandardFilter::from_name("urldecode"),
        Some(StandardFilter::UrlDecode)
    );
    assert_eq!(StandardFilter::from_name("date"), Some(StandardFilter::Date));
    assert_eq!(StandardFilter::from_name("strftime"), None);
}

#[test]
fn abs_accepts_numeric_strings() {
    assert_eq!(render("abs", 17, vec![]), "17");
    assert_eq!(render("abs", -17, vec![]), "17");
    assert_eq!(render("abs", "-17", vec![]), "17");
    assert_eq!(render("abs", "-19.86", vec![]), "19.86");
    assert_eq!(render("abs", 0, vec![]), "0");
}

#[test]
fn append_and_prepend_concatenate_text() {
    assert_eq!(render("append", "a", vec!["b".into()]), "ab");
    assert_eq!(render("append", 1, vec![2.into()]), "12");
    assert_eq!(render("prepend", "a", vec!["b".into()]), "ba");
}

#[test]
fn arithmetic_filters_mix_ints_and_floats() {
    assert_eq!(render("plus", "1", vec!["1.0".into()]), "2.0");
    assert_eq!(render("plus", 1, vec![1.into()]), "2");
    assert_eq!(render("minus", "4.3", vec!["2".into()]), "2.3");
    assert_eq!(render("minus", 5, vec![1.into()]), "4");
    assert_eq!(render("times", 3, vec![4.into()]), "12");
    assert_eq!(render("times", "foo", vec![4.into()]), "0");
    assert_eq!(render("times", 0.0725, vec![100.into()]), "7.25");
    assert_eq!(render("times", -0.0725, vec![100.into()]), "-7.25");
}

#[test]
fn divided_by_floors_integers_and_rejects_zero() {
    assert_eq!(render("divided_by", 12, vec![3.into()]), "4");
    assert_eq!(render("divided_by", 14, vec![3.into()]), "4");
    assert_eq!(render("divided_by", -9, vec![2.into()]), "-5");
    assert_eq!(render("divided_by", 15, vec![2.0.into()]), "7.5");
    assert_eq!(
        apply("divided_by", 5, vec![0.into()]),
        Err(FilterError::DivisionByZero)
    );
    assert_eq!(
        apply("divided_by", 5, vec![0.0.into()]),
        Err(FilterError::DivisionByZero)
    );
}

#[test]
fn divided_by_survives_integer_overflow() {
    assert_eq!(
        StandardFilter::DividedBy
            .apply(&Value::Int(i64::MIN), &FilterArgs::new(vec![Value::Int(-1)])),
        Ok(Value::Float(9_223_372_036_854_775_808.0))
    );
    assert_eq!(
        apply("divided_by", Value::Int(i64::MIN), vec![2.into()]),
        Ok(Value::Int(i64::MIN / 2))
    );
    assert_eq!(
        apply("modulo", Value::Int(i64::MIN), vec![(-1).into()]),
        Ok(Value::Int(0))
    );
}

#[test]
fn date_formats_strings_and_timestamps() {
    assert_eq!(render("date", "2006-05-05 10:00:00", vec!["%B".into()]), "May");
    assert_eq!(render("date", "2006-06-05 10:00:00", vec!["%B".into()]), "June");
    assert_eq!(render("date", "2006-07-05 10:00:00", vec!["%B".into()]), "July");
    assert_eq!(
        render("date", "2006-07-05 10:00:00", vec!["%m/%d/%Y".into()]),
        "07/05/2006"
    );
    assert_eq!(
        render("date", "Fri Jul 16 01:00:00 2004", vec!["%m/%d/%Y".into()]),
        "07/16/2004"
    );
    assert_eq!(render("date", 1152098955, vec!["%m/%d/%Y".into()]), "07/05/2006");
    assert_eq!(render("date", "1152098955", vec!["%m/%d/%Y".into()]), "07/05/2006");
}

#[test]
fn date_passes_through_empty_input_and_format() {
    assert_eq!(
        render("date", "2006-07-05 10:00:00", vec!["".into()]),
        "2006-07-05 10:00:00"
    );
    assert_eq!(
        render("date", "2006-07-05 10:00:00", vec![Value::None]),
        "2006-07-05 10:00:00"
    );
    assert_eq!(apply("date", Value::None, vec!["%B".into()]), Ok(Value::None));
    assert_eq!(apply("date", "", vec!["%B".into()]), Ok(Value::from("")));
    assert_eq!(
        render("date", "sometime soon", vec!["%Y".into()]),
        "sometime soon"
    );
}

#[test]
fn date_understands_now_and_today() {
    let year = chrono::Local::now().format("%Y").to_string();
    assert_eq!(render("date", "now", vec!["%Y".into()]), year);
    assert_eq!(render("date", "today", vec!["%Y".into()]), year);
    assert_eq!(render("date", "Today", vec!["%Y".into()]), year);
}

#[test]
fn modulo_follows_divisor_sign() {
    assert_eq!(render("modulo", 3, vec![2.into()]), "1");
    assert_eq!(render("modulo", -7, vec![3.into()]), "2");
    assert_eq!(render("modulo", 7, vec![(-3).into()]), "-2");
    assert_eq!(
        apply("modulo", 1, vec![0.into()]),
        Err(FilterError::DivisionByZero)
    );
}

#[test]
fn rounding_filters() {
    assert_eq!(render("round", 4.6, vec![]), "5");
    assert_eq!(render("round", "4.3", vec![]), "4");
    assert_eq!(render("round", 4.5612, vec![2.into()]), "4.56");
    assert_eq!(render("ceil", 4.6, vec![]), "5");
    assert_eq!(render("ceil", "4.3", vec![]), "5");
    assert_eq!(render("floor", 4.6, vec![]), "4");
    assert_eq!(render("floor", "4.3", vec![]), "4");
}

#[test]
fn case_filters_treat_none_as_empty() {
    assert_eq!(render("downcase", "Testing", vec![]), "testing");
    assert_eq!(apply("downcase", Value::None, vec![]), Ok(Value::from("")));
    assert_eq!(render("upcase", "Testing", vec![]), "TESTING");
    assert_eq!(apply("upcase", Value::None, vec![]), Ok(Value::from("")));
    assert_eq!(render("capitalize", "my GREAT title", vec![]), "My great title");
}

#[test]
fn compact_drops_missing_values() {
    let values = list(vec![1.into(), Value::None, 2.into(), Value::None]);
    assert_eq!(
        apply("compact", values, vec![]),
        Ok(list(vec![1.into(), 2.into()]))
    );

    let hashes = json(serde_json::json!([{"a": "A"}, {"a": null}, {"a": "C"}]));
    let compacted = apply("compact", hashes, vec!["a".into()]).expect("compact should succeed");
    let mapped = apply("map", compacted, vec!["a".into()]).expect("map should succeed");
    assert_eq!(render("join", mapped, vec![]), "A C");
}

#[test]
fn default_replaces_falsy_values() {
    assert_eq!(render("default", "foo", vec!["bar".into()]), "foo");
    assert_eq!(render("default", Value::None, vec!["bar".into()]), "bar");
    assert_eq!(render("default", "", vec!["bar".into()]), "bar");
    assert_eq!(render("default", false, vec!["bar".into()]), "bar");
    assert_eq!(render("default", list(vec![]), vec!["bar".into()]), "bar");
}

#[test]
fn escape_filters() {
    assert_eq!(render("escape", "<strong>", vec![]), "&lt;strong&gt;");
    assert_eq!(apply("escape", Value::None, vec![]), Ok(Value::None));
    assert_eq!(
        render("escape_once", "&lt;strong&gt;Hulk</strong>", vec![]),
        "&lt;strong&gt;Hulk&lt;/strong&gt;"
    );
}

#[test]
fn first_last_size_and_reverse() {
    let numbers = list(vec![1.into(), 2.into(), 3.into()]);
    assert_eq!(render("first", numbers.clone(), vec![]), "1");
    assert_eq!(render("last", numbers.clone(), vec![]), "3");
    assert_eq!(render("size", numbers.clone(), vec![]), "3");
    assert_eq!(render("reverse", numbers, vec![]), "321");
    assert_eq!(render("first", list(vec![]), vec![]), "");
    assert_eq!(render("size", "测试", vec![]), "2");
    assert_eq!(render("size", Value::None, vec![]), "0");
}

#[test]
fn join_uses_space_by_default() {
    let words = list(vec!["1".into(), "2".into(), "3".into()]);
    assert_eq!(render("join", words.clone(), vec![]), "1 2 3");
    assert_eq!(render("join", words, vec![" - ".into()]), "1 - 2 - 3");
}

#[test]
fn map_reads_fields_and_flattens() {
    let rows = json(serde_json::json!([{"a": 1}, {"a": 2}, {"a": 3}, {"a": 4}]));
    assert_eq!(
        apply("map", rows, vec!["a".into()]),
        Ok(list(vec![1.into(), 2.into(), 3.into(), 4.into()]))
    );

    let thing = json(serde_json::json!({"foo": [{"bar": 42}, {"bar": 17}]}));
    let inner = apply("map", thing, vec!["foo".into()]).expect("map should succeed");
    assert_eq!(render("map", inner, vec!["bar".into()]), "4217");

    assert_eq!(render("map", "foo", vec!["inspect".into()]), "");
    assert_eq!(
        apply("map", "foo", vec![]),
        Err(FilterError::MissingArgument {
            filter: "map",
            argument: "property",
        })
    );
}

#[test]
fn map_prepares_objects_before_reading() {
    let things = list(vec![Value::object(Thing::default())]);
    assert_eq!(render("map", things, vec!["whatever".into()]), "woot: 1");
}

#[test]
fn range_builds_integer_lists() {
    let bounds = list(vec![1.into(), 3.into()]);
    assert_eq!(render("range", bounds.clone(), vec![]), "12");
    let inclusive = FilterArgs::default().with_kwarg("inclusive", true.into());
    assert_eq!(
        StandardFilter::Range
            .apply(&bounds, &inclusive)
            .map(|value| value.to_string()),
        Ok("123".to_string())
    );
    assert_eq!(render("range", 3, vec![]), "012");
    assert_eq!(
        render("range", list(vec![5.into(), 0.into(), (-2).into()]), vec![]),
        "531"
    );
    assert!(apply("range", list(vec![1.into(), 2.into(), 0.into()]), vec![]).is_err());
}

#[test]
fn remove_and_replace() {
    assert_eq!(render("remove", "a a a a", vec!["a".into()]), "   ");
    assert_eq!(render("remove_first", "a a a a", vec!["a ".into()]), "a a a");
    assert_eq!(render("remove", "1 1 1 1", vec![1.into()]), "   ");
    assert_eq!(render("replace", "a a a a", vec!["a".into(), "b".into()]), "b b b b");
    assert_eq!(
        render("replace_first", "a a a a", vec!["a".into(), "b".into()]),
        "b a a a"
    );
    assert_eq!(render("replace", "1 1 1 1", vec![1.into(), 2.into()]), "2 2 2 2");
}

#[test]
fn slice_handles_negative_and_out_of_range_offsets() {
    assert_eq!(render("slice", "foobar", vec![1.into(), 3.into()]), "oob");
    assert_eq!(render("slice", "foobar", vec![1.into(), 1000.into()]), "oobar");
    assert_eq!(render("slice", "foobar", vec![1.into(), 0.into()]), "");
    assert_eq!(render("slice", "foobar", vec![1.into()]), "o");
    assert_eq!(render("slice", "foobar", vec![3.into(), 3.into()]), "bar");
    assert_eq!(render("slice", "foobar", vec![(-2).into(), 2.into()]), "ar");
    assert_eq!(render("slice", "foobar", vec![(-2).into(), 1000.into()]), "ar");
    assert_eq!(render("slice", "foobar", vec![(-1).into()]), "r");
    assert_eq!(render("slice", Value::None, vec![0.into()]), "");
    assert_eq!(render("slice", "foobar", vec![100.into(), 10.into()]), "");
    assert_eq!(render("slice", "foobar", vec![(-100).into(), 10.into()]), "");
    assert_eq!(render("slice", "foobar", vec!["1".into(), "3".into()]), "oob");

    let letters = list(vec!["f".into(), "o".into(), "o".into(), "b".into()]);
    assert_eq!(
        apply("slice", letters, vec![1.into(), 2.into()]),
        Ok(list(vec!["o".into(), "o".into()]))
    );
}

#[test]
fn slice_rejects_unusable_bounds() {
    assert_eq!(
        apply("slice", "foobar", vec![Value::None]),
        Err(FilterError::TypeMismatch("number"))
    );
    assert!(matches!(
        apply("slice", "foobar", vec![0.into(), "".into()]),
        Err(FilterError::InvalidNumber(_))
    ));
}

#[test]
fn sort_and_sort_natural() {
    let words = list(vec!["sensitive".into(), "Expected".into(), "case".into()]);
    assert_eq!(
        render("join", apply("sort", words.clone(), vec![]).expect("sort"), vec![]),
        "Expected case sensitive"
    );
    assert_eq!(
        render(
            "join",
            apply("sort_natural", words, vec![]).expect("sort_natural"),
            vec![]
        ),
        "case Expected sensitive"
    );
    let rows = json(serde_json::json!([{"a": 4}, {"a": 3}, {"a": 1}, {"a": 2}]));
    let sorted = apply("sort", rows, vec!["a".into()]).expect("sort by property");
    assert_eq!(render("map", sorted, vec!["a".into()]), "1234");
    assert_eq!(render("sort", "foo", vec![]), "foo");
}

#[test]
fn split_text() {
    assert_eq!(
        apply("split", "12~34", vec!["~".into()]),
        Ok(list(vec!["12".into(), "34".into()]))
    );
    assert_eq!(
        apply("split", "A1Z", vec![1.into()]),
        Ok(list(vec!["A".into(), "Z".into()]))
    );
    assert_eq!(
        apply("split", "abc", vec!["".into()]),
        Ok(list(vec!["a".into(), "b".into(), "c".into()]))
    );
    assert_eq!(apply("split", Value::None, vec![" ".into()]), Ok(list(vec![])));
}

#[test]
fn whitespace_and_markup_stripping() {
    assert_eq!(render("strip", " \tab c  \n \t", vec![]), "ab c");
    assert_eq!(render("lstrip", " ab c  ", vec![]), "ab c  ");
    assert_eq!(render("rstrip", " ab c  ", vec![]), " ab c");
    assert_eq!(render("strip_newlines", "a\nb\r\nc", vec![]), "abc");
    assert_eq!(render("newline_to_br", "a\nb\nc", vec![]), "a<br />\nb<br />\nc");
    assert_eq!(render("strip_html", "<div>test</div>", vec![]), "test");
    assert_eq!(
        render("strip_html", "<div id='test'>test</div>", vec![]),
        "test"
    );
    assert_eq!(
        render(
            "strip_html",
            "<script type='text/javascript'>document.write('some stuff');</script>",
            vec![]
        ),
        ""
    );
    assert_eq!(
        render("strip_html", "<style type='text/css'>foo bar</style>", vec![]),
        ""
    );
    assert_eq!(render("strip_html", "<!-- hidden -->visible", vec![]), "visible");
    assert_eq!(render("strip_html", Value::None, vec![]), "");
}

#[test]
fn truncate_allows_leeway() {
    assert_eq!(render("truncate", "1234567890", vec![7.into()]), "1234567890");
    assert_eq!(
        render("truncate", "123456789012345678", vec![7.into()]),
        "1234..."
    );
    assert_eq!(render("truncate", "123456789012345678", vec![0.into()]), "...");
    assert_eq!(
        render("truncate", "测试测试测试测试测试测试测试测试", vec![5.into()]),
        "测试..."
    );
    assert_eq!(
        render("truncate", "1234567890123456", vec![5.into(), 1.into()]),
        "12341"
    );
}

#[test]
fn truncatewords_keeps_short_input() {
    assert_eq!(
        render("truncatewords", "one two three", vec![4.into()]),
        "one two three"
    );
    assert_eq!(
        render("truncatewords", "one two three", vec![2.into()]),
        "one two..."
    );
    assert_eq!(
        render("truncatewords", "one two three", vec![2.into(), 1.into()]),
        "one two1"
    );
    assert_eq!(
        render("truncatewords", "测试测试测试测试", vec![5.into()]),
        "测试测试测试测试"
    );
}

#[test]
fn uniq_keeps_first_occurrence() {
    assert_eq!(apply("uniq", "foo", vec![]), Ok(list(vec!["foo".into()])));
    let numbers = [1, 1, 3, 2, 3, 1, 4, 3, 2, 1]
        .into_iter()
        .map(Value::from)
        .collect();
    assert_eq!(render("uniq", list(numbers), vec![]), "1324");

    let rows = json(serde_json::json!([{"a": 1}, {"a": 3}, {"a": 1}, {"a": 2}]));
    assert_eq!(
        apply("uniq", rows, vec!["a".into()]),
        Ok(json(serde_json::json!([{"a": 1}, {"a": 3}, {"a": 2}])))
    );

    let first = Value::object(TestDrop);
    let drops = list(vec![first.clone(), Value::object(TestDrop)]);
    assert_eq!(apply("uniq", drops, vec!["test".into()]), Ok(list(vec![first])));
}

#[test]
fn url_encoding() {
    assert_eq!(
        render("url_encode", "foo+1@example.com", vec![]),
        "foo%2B1%40example.com"
    );
    assert_eq!(render("url_encode", "foo bar", vec![]), "foo+bar");
    assert_eq!(apply("url_encode", Value::None, vec![]), Ok(Value::None));
    assert_eq!(render("url_decode", "foo+bar", vec![]), "foo bar");
    assert_eq!(render("url_decode", "foo%20bar", vec![]), "foo bar");
    assert_eq!(
        render("urldecode", "foo%2B1%40example.com", vec![]),
        "foo+1@example.com"
    );
    assert_eq!(render("url_decode", "a=b&c", vec![]), "a=b&c");
    assert_eq!(apply("url_decode", Value::None, vec![]), Ok(Value::None));
}
