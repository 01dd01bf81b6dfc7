//! Image discovery in rendered chart output
//!
//! Rendered manifests are walked as generic YAML trees. Two shapes are
//! recognised anywhere in the tree:
//! - pod-spec container lists (`containers`, `initContainers`,
//!   `ephemeralContainers`) whose items carry an `image` string
//! - any mapping with an `image` key, either a plain string or a
//!   values-style `{repository, tag, digest}` mapping
//!
//! The walk never stops at a match, since Helm output nests pod specs at
//! arbitrary depth (CronJob -> Job -> Pod, CRD specs, embedded values).
//!
//! Each `---` document is parsed on its own. Duplicate mapping keys are
//! accepted with the last value winning, as Helm output often repeats
//! labels. Only a document that still fails to parse is line-scanned.

use std::fmt;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::image::ImageReference;

/// Pod-spec keys holding lists of containers
pub const CONTAINER_LIST_KEYS: [&str; 3] = ["containers", "initContainers", "ephemeralContainers"];

static IMAGE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^-?\s*image:\s*([^\s#]+)").expect("valid image line pattern"));

/// How the image list was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Full structural walk over parsed documents
    Structured,
    /// Line-by-line pattern scan; nested mapping-form images are missed
    Degraded,
}

/// Result of extracting images from rendered text
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Images in first-seen order, without duplicates
    pub images: Vec<ImageReference>,
    pub mode: ExtractionMode,
}

impl Extraction {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.mode == ExtractionMode::Degraded
    }
}

/// Ordered, de-duplicating accumulator for one extraction pass
#[derive(Debug, Default)]
struct ImageCollector {
    images: IndexSet<ImageReference>,
}

impl ImageCollector {
    fn add(&mut self, image: Option<ImageReference>) {
        if let Some(image) = image {
            self.images.insert(image);
        }
    }

    fn visit(&mut self, node: &Value) {
        match node {
            Value::Mapping(map) => self.visit_mapping(map),
            Value::Sequence(items) => {
                for item in items {
                    self.visit(item);
                }
            }
            Value::Tagged(tagged) => self.visit(&tagged.value),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }

    fn visit_mapping(&mut self, map: &Mapping) {
        for key in CONTAINER_LIST_KEYS {
            let Some(Value::Sequence(containers)) = map.get(key) else {
                continue;
            };
            for container in containers {
                if let Value::Mapping(container) = container {
                    if let Some(Value::String(image)) = container.get("image") {
                        self.add(ImageReference::parse(image));
                    }
                }
            }
        }

        match map.get("image") {
            Some(Value::String(image)) => self.add(ImageReference::parse(image)),
            Some(Value::Mapping(spec)) => self.add(ImageReference::from_spec(spec)),
            _ => {}
        }

        for value in map.values() {
            self.visit(value);
        }
    }

    fn scan_lines(&mut self, text: &str) {
        for line in text.lines() {
            if let Some(captures) = IMAGE_LINE.captures(line.trim()) {
                self.add(ImageReference::parse(&captures[1]));
            }
        }
    }

    fn finish(self) -> Vec<ImageReference> {
        self.images.into_iter().collect()
    }
}

/// Extract image references from parsed manifest documents.
///
/// Pure and deterministic: the same documents always give the same list.
#[must_use]
pub fn extract(documents: &[Value]) -> Vec<ImageReference> {
    let mut collector = ImageCollector::default();
    for document in documents {
        collector.visit(document);
    }
    collector.finish()
}

/// YAML value whose mappings keep the last of any duplicate keys
struct LenientValue(Value);

impl<'de> Deserialize<'de> for LenientValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientVisitor).map(LenientValue)
    }
}

struct LenientVisitor;

impl<'de> Visitor<'de> for LenientVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        LenientValue::deserialize(deserializer).map(|v| v.0)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(LenientValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mapping = Mapping::new();
        while let Some((LenientValue(key), LenientValue(value))) = map.next_entry()? {
            // last wins, first position kept
            mapping.insert(key, value);
        }
        Ok(Value::Mapping(mapping))
    }

    fn visit_enum<A>(self, data: A) -> std::result::Result<Value, A::Error>
    where
        A: EnumAccess<'de>,
    {
        let (tag, variant) = data.variant::<String>()?;
        let LenientValue(value) = variant.newtype_variant()?;
        Ok(Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(tag),
            value,
        })))
    }
}

/// Split a YAML stream into the text of its `---` separated documents.
///
/// Documents holding only comments or blank lines are dropped.
fn split_documents(text: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if is_document_marker(line) {
            documents.push(&text[start..offset]);
            // anything after the marker belongs to the next document
            start = offset + 3;
        }
        offset += line.len();
    }
    documents.push(&text[start..]);
    documents.retain(|document| has_content(document));
    documents
}

fn is_document_marker(line: &str) -> bool {
    line.strip_prefix("---")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

fn has_content(document: &str) -> bool {
    document.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    })
}

fn parse_document(text: &str) -> Result<Value> {
    let LenientValue(value) = serde_yaml::from_str(text)?;
    Ok(value)
}

/// Parse a multi-document YAML stream (`---` separated).
///
/// Fails on the first document that is not valid YAML.
pub fn parse_documents(text: &str) -> Result<Vec<Value>> {
    split_documents(text).into_iter().map(parse_document).collect()
}

/// Scan rendered text line by line for `image:` fields.
///
/// Only catches the `image: <ref>` / `- image: <ref>` forms and cannot see
/// mapping-form images.
#[must_use]
pub fn extract_by_pattern(text: &str) -> Vec<ImageReference> {
    let mut collector = ImageCollector::default();
    collector.scan_lines(text);
    collector.finish()
}

/// Extract images from rendered chart text.
///
/// Documents that parse are walked structurally. A document that does not
/// is scanned with the line pattern instead and the result is
/// [`ExtractionMode::Degraded`], which the caller must surface.
#[must_use]
pub fn extract_from_text(text: &str) -> Extraction {
    let mut collector = ImageCollector::default();
    let mut mode = ExtractionMode::Structured;
    for (index, document) in split_documents(text).into_iter().enumerate() {
        match parse_document(document) {
            Ok(value) => collector.visit(&value),
            Err(e) => {
                tracing::warn!(
                    document = index,
                    error = %e,
                    "rendered document is not valid YAML, falling back to line scan"
                );
                collector.scan_lines(document);
                mode = ExtractionMode::Degraded;
            }
        }
    }
    Extraction {
        images: collector.finish(),
        mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(images: &[ImageReference]) -> Vec<&str> {
        images.iter().map(ImageReference::as_str).collect()
    }

    fn extract_yaml(text: &str) -> Vec<ImageReference> {
        extract(&parse_documents(text).unwrap())
    }

    const RENDERED: &str = r#"---
# Source: cilium/templates/cilium-agent/daemonset.yaml
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: cilium
spec:
  template:
    spec:
      initContainers:
        - name: config
          image: "quay.io/cilium/cilium:v1.14.2"
        - name: mount-cgroup
          image: quay.io/cilium/cilium:v1.14.2
      containers:
        - name: cilium-agent
          image: quay.io/cilium/cilium:v1.14.2
---
# Source: cilium/templates/cilium-operator/deployment.yaml
apiVersion: apps/v1
kind: Deployment
metadata:
  name: cilium-operator
spec:
  template:
    spec:
      containers:
        - name: cilium-operator
          image: 'quay.io/cilium/operator-generic:v1.14.2'
---
apiVersion: batch/v1
kind: CronJob
metadata:
  name: cleanup
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers:
            - name: cleanup
              image: busybox:1.36
          ephemeralContainers:
            - name: debug
              image: quay.io/cilium/cilium:v1.14.2
"#;

    #[test]
    fn test_extract_rendered_chart() {
        let images = extract_yaml(RENDERED);
        insta::assert_debug_snapshot!(names(&images), @r#"
        [
            "quay.io/cilium/cilium:v1.14.2",
            "quay.io/cilium/operator-generic:v1.14.2",
            "busybox:1.36",
        ]
        "#);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let documents = parse_documents(RENDERED).unwrap();
        assert_eq!(extract(&documents), extract(&documents));
    }

    #[test]
    fn test_single_container() {
        let images = extract_yaml("containers:\n  - image: nginx:1.25\n");
        assert_eq!(names(&images), vec!["nginx:1.25"]);
    }

    #[test]
    fn test_values_style_image() {
        let images = extract_yaml(
            r#"
kind: ConfigMap
data:
  config:
    hubble:
      relay:
        image:
          repository: quay.io/x
          tag: v1
"#,
        );
        assert_eq!(names(&images), vec!["quay.io/x:v1"]);
    }

    #[test]
    fn test_values_style_digest() {
        let images = extract_yaml(
            "image:\n  repository: quay.io/x\n  tag: v1\n  digest: sha256:abc\n",
        );
        assert_eq!(names(&images), vec!["quay.io/x@sha256:abc"]);
    }

    #[test]
    fn test_image_mapping_without_repository() {
        let images = extract_yaml("image:\n  tag: v1\n  pullPolicy: IfNotPresent\n");
        assert!(images.is_empty());
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let images = extract_yaml(
            r#"
containers:
  - image: a:1
  - image: b:1
---
containers:
  - image: c:1
  - image: a:1
---
image: b:1
"#,
        );
        assert_eq!(names(&images), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn test_scalar_and_empty_documents_are_skipped() {
        let images = extract_yaml("just a string\n---\n---\n42\n---\ncontainers:\n  - image: x\n");
        assert_eq!(names(&images), vec!["x"]);
    }

    #[test]
    fn test_container_list_ignores_non_string_images() {
        let images = extract_yaml(
            r#"
containers:
  - name: weird
    image: 5
  - name: missing
  - just-a-string
  - image: "  "
"#,
        );
        assert!(images.is_empty());
    }

    #[test]
    fn test_no_reference_has_surrounding_quotes_or_space() {
        let images = extract_yaml(
            r#"
containers:
  - image: "'nginx'"
  - image: " spaced:1 "
image: '"quoted:2"'
"#,
        );
        for image in &images {
            let s = image.as_str();
            assert!(!s.is_empty());
            assert_eq!(s, s.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\''));
        }
        assert_eq!(names(&images), vec!["nginx", "spaced:1", "quoted:2"]);
    }

    #[test]
    fn test_extract_by_pattern() {
        let text = r#"
spec:
  containers:
    - image: nginx:1.25 # pinned
    - name: sidecar
      image: "envoy:v1"
  # image: commented:out
    image: nginx:1.25
"#;
        let images = extract_by_pattern(text);
        assert_eq!(names(&images), vec!["nginx:1.25", "envoy:v1"]);
    }

    #[test]
    fn test_extract_from_text_structured() {
        let extraction = extract_from_text(RENDERED);
        assert_eq!(extraction.mode, ExtractionMode::Structured);
        assert_eq!(extraction.images.len(), 3);
    }

    #[test]
    fn test_duplicate_keys_do_not_degrade() {
        let text = r#"apiVersion: v1
kind: ConfigMap
metadata:
  labels:
    app: a
    app: a
---
kind: ConfigMap
data:
  relay:
    image:
      repository: quay.io/x
      tag: v1
"#;
        let extraction = extract_from_text(text);
        assert_eq!(extraction.mode, ExtractionMode::Structured);
        assert_eq!(names(&extraction.images), vec!["quay.io/x:v1"]);
    }

    #[test]
    fn test_duplicate_image_key_last_wins() {
        let images = extract_yaml("image: a:1\nimage: b:1\n");
        assert_eq!(names(&images), vec!["b:1"]);
    }

    #[test]
    fn test_tagged_values_are_walked() {
        let images = extract_yaml("spec: !custom\n  containers:\n    - image: tagged:1\n");
        assert_eq!(names(&images), vec!["tagged:1"]);
    }

    #[test]
    fn test_only_broken_document_is_line_scanned() {
        let text = r#"containers:
  - image: first:1
---
containers:
  - image: broken:1
 bad: [unclosed
---
image:
  repository: quay.io/x
  tag: v1
"#;
        let extraction = extract_from_text(text);
        assert!(extraction.is_degraded());
        assert_eq!(
            names(&extraction.images),
            vec!["first:1", "broken:1", "quay.io/x:v1"]
        );
    }

    #[test]
    fn test_split_documents() {
        let text = "# Source: a.yaml\n---\na: 1\n--- # Source: b.yaml\nb: 2\n---\n# Source: empty.yaml\n";
        assert_eq!(split_documents(text), vec!["\na: 1\n", " # Source: b.yaml\nb: 2\n"]);
        assert!(split_documents("").is_empty());
        assert_eq!(split_documents("key: ---value\n"), vec!["key: ---value\n"]);
    }

    #[test]
    fn test_extract_from_text_degrades_on_invalid_yaml() {
        let text = "containers:\n  - image: nginx:1.25\n bad: [unclosed\n";
        let extraction = extract_from_text(text);
        assert!(extraction.is_degraded());
        assert_eq!(names(&extraction.images), vec!["nginx:1.25"]);
    }
}
