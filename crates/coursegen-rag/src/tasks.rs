//! Task templates for the instructional content tools
//!
//! Each task declares its input fields, prompt text, conditional prompt
//! fragments, output schema and sampling parameters. Built-in tasks cover
//! quiz questions, discussion prompts, learning objectives and video
//! scripts; more can be declared in the `[[tasks]]` config section.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::prompt::template;
use crate::providers::GenerationParams;
use crate::types::request::{value_as_text, GenerationRequest};

/// Placeholder that receives the retrieved passages
pub const CONTEXT_PLACEHOLDER: &str = "context";

const ACADEMIC_STAGES: &[&str] = &[
    "Lower Primary",
    "Middle Primary",
    "Upper Primary",
    "Lower Secondary",
    "Upper Secondary",
    "Undergraduate",
    "Postgraduate",
];

/// Accepted shape of an input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text (numbers and lists are rendered as text)
    Text,
    /// Whole number within optional bounds
    Integer {
        #[serde(default)]
        min: Option<i64>,
        #[serde(default)]
        max: Option<i64>,
    },
    /// One of a fixed set of options
    Choice { options: Vec<String> },
    /// Boolean switch, usually gating a prompt fragment
    Flag,
}

/// Declaration of one request field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            default: None,
            description: None,
        }
    }

    fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    fn integer(name: &str, min: i64, max: i64, default: i64) -> Self {
        Self::new(
            name,
            FieldKind::Integer {
                min: Some(min),
                max: Some(max),
            },
        )
        .with_default(json!(default))
    }

    fn stage(name: &str) -> Self {
        Self::new(
            name,
            FieldKind::Choice {
                options: ACADEMIC_STAGES.iter().map(|s| s.to_string()).collect(),
            },
        )
        .with_default(json!("Undergraduate"))
    }

    fn flag(name: &str) -> Self {
        Self::new(name, FieldKind::Flag)
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Check a supplied value against the declared kind
    fn check(&self, value: &Value) -> Result<()> {
        let reject = |reason: String| Err(Error::request_validation(&self.name, reason));

        match &self.kind {
            FieldKind::Text => match value {
                Value::Object(_) => reject("expected text, got an object".to_string()),
                _ => Ok(()),
            },
            FieldKind::Integer { min, max } => {
                let number = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let Some(number) = number else {
                    return reject(format!("expected an integer, got {}", value));
                };
                if let Some(min) = min {
                    if number < *min {
                        return reject(format!("{} is below the minimum of {}", number, min));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        return reject(format!("{} is above the maximum of {}", number, max));
                    }
                }
                Ok(())
            }
            FieldKind::Choice { options } => {
                let text = value_as_text(value).unwrap_or_default();
                if options.iter().any(|o| o == &text) {
                    Ok(())
                } else {
                    reject(format!("'{}' is not one of: {}", text, options.join(", ")))
                }
            }
            FieldKind::Flag => match value {
                Value::Bool(_) => Ok(()),
                _ => reject(format!("expected true or false, got {}", value)),
            },
        }
    }
}

/// Prompt text appended when its conditions hold
///
/// A condition value of `true` means the field is present, `false` that it
/// is absent, and any other value that the field equals it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptFragment {
    #[serde(default)]
    pub when: BTreeMap<String, Value>,
    pub text: String,
}

impl PromptFragment {
    fn when(field: &str, condition: Value, text: &str) -> Self {
        Self {
            when: BTreeMap::from([(field.to_string(), condition)]),
            text: text.to_string(),
        }
    }

    /// Check the conditions against resolved field values
    pub fn applies(&self, fields: &BTreeMap<String, String>) -> bool {
        self.when.iter().all(|(name, condition)| {
            let value = fields.get(name);
            match condition {
                Value::Bool(true) => value.is_some(),
                Value::Bool(false) => value.is_none(),
                other => match (value, value_as_text(other)) {
                    (Some(actual), Some(expected)) => *actual == expected,
                    _ => false,
                },
            }
        })
    }
}

/// JSON type of an output field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Integer => value.is_i64() || value.is_u64(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }

    fn json_type(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

/// One field of a structured output object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: ValueKind,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Fields of each object inside an array
    #[serde(default)]
    pub items: Option<Vec<SchemaField>>,
}

fn default_true() -> bool {
    true
}

impl SchemaField {
    fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            items: None,
        }
    }

    fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn of_objects(mut self, items: Vec<SchemaField>) -> Self {
        self.items = Some(items);
        self
    }
}

/// Expected shape of a task's JSON output; the root is always an object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub fields: Vec<SchemaField>,
}

impl OutputSchema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Validate a parsed output value, naming the first offending path
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        validate_object(value, &self.fields, "$")
    }

    /// JSON Schema document for providers that accept one
    pub fn to_json_schema(&self) -> Value {
        object_schema(&self.fields)
    }

    /// Compact example of the expected structure for the system prompt
    pub fn example(&self) -> Value {
        object_example(&self.fields)
    }
}

fn validate_object(value: &Value, fields: &[SchemaField], path: &str) -> std::result::Result<(), String> {
    let Some(object) = value.as_object() else {
        return Err(format!("{} must be a JSON object", path));
    };

    for field in fields {
        let field_path = format!("{}.{}", path, field.name);
        let Some(item) = object.get(&field.name).filter(|v| !v.is_null()) else {
            if field.required {
                return Err(format!("missing required field {}", field_path));
            }
            continue;
        };

        if !field.kind.matches(item) {
            return Err(format!(
                "{} must be of type {}",
                field_path,
                field.kind.json_type()
            ));
        }

        if let (Some(items), Some(array)) = (&field.items, item.as_array()) {
            if field.required && array.is_empty() {
                return Err(format!("{} must not be empty", field_path));
            }
            for (i, element) in array.iter().enumerate() {
                validate_object(element, items, &format!("{}[{}]", field_path, i))?;
            }
        }
    }

    Ok(())
}

fn object_schema(fields: &[SchemaField]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for field in fields {
        let schema = match &field.items {
            Some(items) => json!({"type": "array", "items": object_schema(items)}),
            None => json!({"type": field.kind.json_type()}),
        };
        properties.insert(field.name.clone(), schema);
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }

    json!({"type": "object", "properties": properties, "required": required})
}

fn object_example(fields: &[SchemaField]) -> Value {
    let mut object = serde_json::Map::new();
    for field in fields {
        let example = match (&field.items, field.kind) {
            (Some(items), _) => json!([object_example(items)]),
            (None, ValueKind::String) => json!("..."),
            (None, ValueKind::Number) => json!(0.0),
            (None, ValueKind::Integer) => json!(0),
            (None, ValueKind::Boolean) => json!(false),
            (None, ValueKind::Array) => json!(["..."]),
            (None, ValueKind::Object) => json!({}),
        };
        object.insert(field.name.clone(), example);
    }
    Value::Object(object)
}

/// A named generation task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    /// Main user prompt; `{context}` receives the retrieved passages
    pub user_template: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub fragments: Vec<PromptFragment>,
    /// Fields joined to form the retrieval query when none is given
    #[serde(default)]
    pub query_fields: Vec<String>,
    #[serde(default)]
    pub output_schema: OutputSchema,
    #[serde(default)]
    pub params: GenerationParams,
}

impl TaskTemplate {
    /// Check that every placeholder refers to a declared field
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::config("task id must not be empty"));
        }

        let declared: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();

        // Passages only ever go into the user prompt
        if template::placeholders(&self.id, &self.system_prompt)?
            .iter()
            .any(|name| name == CONTEXT_PLACEHOLDER)
        {
            return Err(Error::template(
                &self.id,
                "'{context}' may only appear in the user template or fragments",
            ));
        }

        let mut texts = vec![self.system_prompt.as_str(), self.user_template.as_str()];
        texts.extend(self.fragments.iter().map(|f| f.text.as_str()));

        for text in texts {
            for name in template::placeholders(&self.id, text)? {
                if name != CONTEXT_PLACEHOLDER && !declared.contains(&name.as_str()) {
                    return Err(Error::template(
                        &self.id,
                        format!("placeholder '{{{}}}' is not a declared field", name),
                    ));
                }
            }
        }

        for name in self.fragments.iter().flat_map(|f| f.when.keys()) {
            if !declared.contains(&name.as_str()) {
                return Err(Error::template(
                    &self.id,
                    format!("fragment condition on undeclared field '{}'", name),
                ));
            }
        }

        for name in &self.query_fields {
            if !declared.contains(&name.as_str()) {
                return Err(Error::config(format!(
                    "task '{}' query field '{}' is not declared",
                    self.id, name
                )));
            }
        }

        Ok(())
    }

    /// Validate request fields against the field specs
    pub fn validate_request(&self, request: &GenerationRequest) -> Result<()> {
        for name in request.fields.keys() {
            if !self.fields.iter().any(|f| &f.name == name) {
                return Err(Error::request_validation(
                    name,
                    format!("not a field of task '{}'", self.id),
                ));
            }
        }

        for spec in &self.fields {
            let supplied = request
                .fields
                .get(&spec.name)
                .filter(|v| !v.is_null())
                .filter(|v| spec.kind == FieldKind::Flag || value_as_text(v).is_some());

            match supplied {
                Some(value) => spec.check(value)?,
                None if spec.required && spec.default.is_none() => {
                    return Err(Error::request_validation(
                        &spec.name,
                        "required field is missing",
                    ));
                }
                None => {}
            }
        }

        Ok(())
    }

    /// Text values for every field that is set or defaulted
    ///
    /// Flags appear only when true.
    pub fn resolve_fields(&self, request: &GenerationRequest) -> BTreeMap<String, String> {
        let mut resolved = BTreeMap::new();

        for spec in &self.fields {
            let value = request
                .fields
                .get(&spec.name)
                .filter(|v| !v.is_null())
                .or(spec.default.as_ref());

            let text = match (&spec.kind, value) {
                (FieldKind::Flag, Some(Value::Bool(true))) => Some("true".to_string()),
                (FieldKind::Flag, _) => None,
                (_, Some(v)) => value_as_text(v),
                (_, None) => None,
            };

            if let Some(text) = text {
                resolved.insert(spec.name.clone(), text);
            }
        }

        resolved
    }

    /// Retrieval query: the explicit one, else the query fields joined
    pub fn query_text(&self, request: &GenerationRequest) -> String {
        if let Some(query) = request.query.as_deref().filter(|q| !q.trim().is_empty()) {
            return query.to_string();
        }

        let resolved = self.resolve_fields(request);
        self.query_fields
            .iter()
            .filter_map(|name| resolved.get(name))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Registry of task templates by id
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskTemplate>,
}

impl TaskRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tasks
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for task in builtin_tasks() {
            registry.tasks.insert(task.id.clone(), task);
        }
        registry
    }

    /// Built-ins plus configured tasks; configured tasks win on id clashes
    pub fn from_config(tasks: &[TaskTemplate]) -> Result<Self> {
        let mut registry = Self::with_builtins();
        for task in tasks {
            registry.register(task.clone())?;
        }
        Ok(registry)
    }

    /// Add or replace a task after validating it
    pub fn register(&mut self, task: TaskTemplate) -> Result<()> {
        task.validate()?;
        if self.tasks.contains_key(&task.id) {
            tracing::info!("Replacing task template '{}'", task.id);
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TaskTemplate> {
        self.tasks.get(id)
    }

    /// Task ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn stage_fragment(text: &str) -> PromptFragment {
    PromptFragment::when("academic_stage", json!(true), text)
}

fn quiz_questions() -> TaskTemplate {
    TaskTemplate {
        id: "quiz_questions".to_string(),
        description: "Multiple-choice quiz questions with feedback".to_string(),
        system_prompt: "You are an assessment designer who writes multiple-choice quiz \
            questions for online courses. Every question must be answerable from the \
            reference material. Give feedback for each option explaining why it is \
            correct or incorrect."
            .to_string(),
        user_template: "Write {questions_num} multiple-choice question(s) for the module \
            \"{title}\", each with {correct_ans_num} correct answer(s) and {distractors_num} \
            incorrect answer(s).\n\nReference material:\n{context}"
            .to_string(),
        fields: vec![
            FieldSpec::text("title").required(),
            FieldSpec::text("module_lo"),
            FieldSpec::integer("questions_num", 1, 10, 3),
            FieldSpec::integer("correct_ans_num", 1, 4, 1),
            FieldSpec::integer("distractors_num", 1, 3, 1),
            FieldSpec::stage("academic_stage"),
            FieldSpec::new(
                "output_format",
                FieldKind::Choice {
                    options: vec![
                        "General Quiz Feedback".to_string(),
                        "Answer-Option Level Quiz Feedback".to_string(),
                        "Coursera Ungraded Quiz".to_string(),
                        "Coursera Graded Quiz".to_string(),
                        "H5P Textual Upload Feature".to_string(),
                        "Open edX OLX Quiz".to_string(),
                        "NIC Quiz".to_string(),
                    ],
                },
            ),
            FieldSpec::text("text_input"),
        ],
        fragments: vec![
            PromptFragment::when(
                "module_lo",
                json!(true),
                "Align the questions with the module learning objectives: {module_lo}",
            ),
            PromptFragment::when(
                "text_input",
                json!(true),
                "Also base the questions on this text:\n{text_input}",
            ),
            stage_fragment("Pitch the questions at the {academic_stage} level."),
            PromptFragment::when(
                "output_format",
                json!(true),
                "Phrase the questions and feedback so they fit the {output_format} format.",
            ),
        ],
        query_fields: vec![
            "title".to_string(),
            "module_lo".to_string(),
            "text_input".to_string(),
        ],
        output_schema: OutputSchema::new(vec![SchemaField::new("questions", ValueKind::Array)
            .of_objects(vec![
                SchemaField::new("question", ValueKind::String),
                SchemaField::new("options", ValueKind::Array),
                SchemaField::new("correct", ValueKind::Array),
                SchemaField::new("feedback", ValueKind::String).optional(),
                SchemaField::new("sources", ValueKind::Array).optional(),
            ])]),
        params: GenerationParams {
            temperature: Some(0.5),
            top_p: Some(0.85),
            frequency_penalty: Some(0.2),
            presence_penalty: Some(0.1),
            max_output_tokens: None,
        },
    }
}

fn discussion_prompt() -> TaskTemplate {
    TaskTemplate {
        id: "discussion_prompt".to_string(),
        description: "Discussion board prompt for an online course".to_string(),
        system_prompt: "You write discussion board prompts for online courses. A prompt has \
            a short introduction, at most two open-ended questions that promote analysis, \
            posting instructions (word counts, peer replies, use of references) and a \
            conclusion with a clear takeaway. Write clearly, in the active voice."
            .to_string(),
        user_template: "Write a discussion prompt aligned with these learning objectives: \
            {learning_objectives}\n\nReference material:\n{context}"
            .to_string(),
        fields: vec![
            FieldSpec::text("learning_objectives").required(),
            FieldSpec::text("learning_content"),
            FieldSpec::stage("academic_stage"),
        ],
        fragments: vec![
            PromptFragment::when(
                "learning_content",
                json!(true),
                "The discussion should also build on this learning content: {learning_content}",
            ),
            stage_fragment("Pitch the discussion at the {academic_stage} level."),
        ],
        query_fields: vec![
            "learning_objectives".to_string(),
            "learning_content".to_string(),
        ],
        output_schema: OutputSchema::new(vec![
            SchemaField::new("title", ValueKind::String),
            SchemaField::new("introduction", ValueKind::String).optional(),
            SchemaField::new("questions", ValueKind::Array),
            SchemaField::new("instructions", ValueKind::Array),
            SchemaField::new("conclusion", ValueKind::String),
        ]),
        params: GenerationParams {
            temperature: Some(0.5),
            top_p: Some(0.85),
            frequency_penalty: Some(0.2),
            presence_penalty: Some(0.1),
            max_output_tokens: None,
        },
    }
}

fn learning_objectives() -> TaskTemplate {
    TaskTemplate {
        id: "learning_objectives".to_string(),
        description: "Measurable module-level learning objectives".to_string(),
        system_prompt: "You are an instructional designer who writes clear, specific and \
            measurable module-level learning objectives for online courses. Start each \
            objective with an observable Bloom's taxonomy verb."
            .to_string(),
        user_template: "Write {lo_quantity} module learning objective(s) for the module \
            \"{title}\".\n\nReference material:\n{context}"
            .to_string(),
        fields: vec![
            FieldSpec::text("title").required(),
            FieldSpec::integer("lo_quantity", 1, 10, 3),
            FieldSpec::text("course_lo"),
            FieldSpec::text("module_content"),
            FieldSpec::text("bloom_levels"),
            FieldSpec::stage("academic_stage"),
            FieldSpec::flag("real_world_relevance"),
            FieldSpec::flag("problem_solving"),
            FieldSpec::flag("ethical_consideration"),
        ],
        fragments: vec![
            PromptFragment::when(
                "course_lo",
                json!(true),
                "Derive them from these course learning objectives: {course_lo}",
            ),
            PromptFragment::when(
                "module_content",
                json!(true),
                "Base them on this module content: {module_content}",
            ),
            PromptFragment::when(
                "bloom_levels",
                json!(true),
                "Focus on these Bloom's taxonomy levels: {bloom_levels}",
            ),
            stage_fragment("Align the objectives with the {academic_stage} level."),
            PromptFragment::when(
                "real_world_relevance",
                json!(true),
                "Make the objectives relevant to real-world practice and industry trends.",
            ),
            PromptFragment::when(
                "problem_solving",
                json!(true),
                "Emphasise problem solving and critical thinking.",
            ),
            PromptFragment::when(
                "ethical_consideration",
                json!(true),
                "Include moral and ethical considerations.",
            ),
        ],
        query_fields: vec![
            "title".to_string(),
            "course_lo".to_string(),
            "module_content".to_string(),
        ],
        output_schema: OutputSchema::new(vec![SchemaField::new("objectives", ValueKind::Array)
            .of_objects(vec![
                SchemaField::new("objective", ValueKind::String),
                SchemaField::new("bloom_level", ValueKind::String).optional(),
            ])]),
        params: GenerationParams {
            temperature: Some(0.3),
            ..GenerationParams::default()
        },
    }
}

/// Script tasks share fields, fragments and sampling; `kind` names the
/// script in the prompt text
fn script_task(
    id: &str,
    kind: &str,
    description: &str,
    system_prompt: &str,
    output_schema: OutputSchema,
) -> TaskTemplate {
    TaskTemplate {
        id: id.to_string(),
        description: description.to_string(),
        system_prompt: system_prompt.to_string(),
        user_template: format!(
            "Write a {} aligned with these objectives: {{learning_objectives}}\n\n\
             Reference material:\n{{context}}",
            kind
        ),
        fields: vec![
            FieldSpec::text("learning_objectives").required(),
            FieldSpec::text("learning_content"),
            FieldSpec::stage("academic_stage"),
        ],
        fragments: vec![
            PromptFragment::when(
                "learning_content",
                json!(true),
                &format!("Base the {} on this content: {{learning_content}}", kind),
            ),
            stage_fragment(&format!("Pitch the {} at the {{academic_stage}} level.", kind)),
        ],
        query_fields: vec![
            "learning_objectives".to_string(),
            "learning_content".to_string(),
        ],
        output_schema,
        params: GenerationParams {
            temperature: Some(0.5),
            top_p: Some(0.9),
            frequency_penalty: Some(0.5),
            presence_penalty: Some(0.3),
            max_output_tokens: None,
        },
    }
}

/// Rows of a timed script table, one per 15 to 20 seconds of video
fn timed_rows() -> OutputSchema {
    OutputSchema::new(vec![
        SchemaField::new("title", ValueKind::String),
        SchemaField::new("rows", ValueKind::Array).of_objects(vec![
            SchemaField::new("time", ValueKind::String),
            SchemaField::new("text", ValueKind::String),
            SchemaField::new("visuals", ValueKind::String),
        ]),
    ])
}

fn video_script() -> TaskTemplate {
    script_task(
        "video_script",
        "video script",
        "Academic video script of roughly 800 words",
        "You write academic video scripts of 780 to 880 words. Open with a hook, state one \
         or two learning objectives, connect the material to real-world examples, develop \
         three or four body sections and close with a conclusion that tells learners how to \
         apply what they learned. Keep the tone clear and conversational.",
        OutputSchema::new(vec![
            SchemaField::new("title", ValueKind::String),
            SchemaField::new("hook", ValueKind::String),
            SchemaField::new("objectives", ValueKind::Array),
            SchemaField::new("sections", ValueKind::Array).of_objects(vec![
                SchemaField::new("heading", ValueKind::String),
                SchemaField::new("script", ValueKind::String),
                SchemaField::new("visuals", ValueKind::String).optional(),
            ]),
            SchemaField::new("conclusion", ValueKind::String),
        ]),
    )
}

fn scenario_video_script() -> TaskTemplate {
    script_task(
        "scenario_video_script",
        "scenario video script",
        "Story-driven scenario video showing concepts applied in practice",
        "You write academic scenario video scripts that show learners how key concepts are \
         applied in real-world practice, using visuals that tell a story. Open with a hook \
         rather than a preamble, establish real-world relevance, present the key ideas, \
         explain how they solve the problem raised at the start and close with takeaways or \
         reflective questions. Split the script into 15 to 20 second rows, assuming 120 \
         words per minute.",
        timed_rows(),
    )
}

fn motion_graphic_script() -> TaskTemplate {
    script_task(
        "motion_graphic_script",
        "motion graphic script",
        "Motion graphic script of 750 to 800 words with visual cues",
        "You write academic motion graphic scripts of 750 to 800 words that blend \
         information and visuals, such as 2.5D animation, renderings and simulations, to \
         improve comprehension. Open with a hook, establish real-world relevance, present \
         the key ideas, link them to the problem raised at the start and close by tying the \
         main points together. Split the script into 15 to 20 second rows, assuming 120 \
         words per minute.",
        timed_rows(),
    )
}

/// The built-in task templates
pub fn builtin_tasks() -> Vec<TaskTemplate> {
    vec![
        quiz_questions(),
        discussion_prompt(),
        learning_objectives(),
        video_script(),
        scenario_video_script(),
        motion_graphic_script(),
    ]
}
