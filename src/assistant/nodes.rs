// SPDX-License-Identifier: MIT

//! Assistant node implementations

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::prompts::{self, CONTENT_CHECK_PROMPT, INSIGHTS_PROMPT, SYSTEM_PROMPT};
use super::state::{
    self, ContentCheck, UserRules, CONTENT_GENERATED, MESSAGES, RULES, USER_RULES,
};
use crate::adk::model::{invoke_structured, ChatModel, GenerationConfig};
use crate::error::GraphError;
use crate::graph::{Node, RunConfig, StateSnapshot, StateUpdate};

/// Answers the conversation, steered by the learned rules
pub struct CallModel {
    model: Arc<dyn ChatModel>,
    config: GenerationConfig,
}

impl CallModel {
    pub fn new(model: Arc<dyn ChatModel>, config: GenerationConfig) -> Self {
        Self { model, config }
    }
}

#[async_trait]
impl Node for CallModel {
    async fn call(
        &self,
        state: &StateSnapshot,
        _config: &RunConfig,
    ) -> Result<StateUpdate, GraphError> {
        let rules = UserRules::from_snapshot(state);
        let prompt = prompts::conversation(
            prompts::with_rules(SYSTEM_PROMPT, &rules),
            state::messages(state),
        );

        let reply = self.model.invoke(&prompt, Some(&self.config)).await?;
        log::debug!("callModel reply: {} chars", reply.content.len());

        let reply = serde_json::to_value(reply)
            .map_err(|e| GraphError::node(state::CALL_MODEL, e.to_string()))?;
        Ok(StateUpdate::new()
            .set(MESSAGES, json!([reply]))
            .set(CONTENT_GENERATED, false))
    }
}

/// Classifies whether the last reply contains generated content
pub struct WasContentGenerated {
    model: Arc<dyn ChatModel>,
    config: GenerationConfig,
}

impl WasContentGenerated {
    pub fn new(model: Arc<dyn ChatModel>, config: GenerationConfig) -> Self {
        Self { model, config }
    }
}

#[async_trait]
impl Node for WasContentGenerated {
    async fn call(
        &self,
        state: &StateSnapshot,
        _config: &RunConfig,
    ) -> Result<StateUpdate, GraphError> {
        let prompt =
            prompts::conversation(CONTENT_CHECK_PROMPT.to_string(), state::messages(state));
        let check: ContentCheck =
            invoke_structured(self.model.as_ref(), &prompt, Some(&self.config)).await?;

        Ok(StateUpdate::new().set(CONTENT_GENERATED, check.content_generated))
    }
}

/// Learns style and content rules from an accepted conversation
pub struct GenerateInsights {
    model: Arc<dyn ChatModel>,
    config: GenerationConfig,
}

impl GenerateInsights {
    pub fn new(model: Arc<dyn ChatModel>, config: GenerationConfig) -> Self {
        Self { model, config }
    }
}

#[async_trait]
impl Node for GenerateInsights {
    async fn call(
        &self,
        state: &StateSnapshot,
        _config: &RunConfig,
    ) -> Result<StateUpdate, GraphError> {
        let existing = UserRules::from_snapshot(state);
        let prompt = prompts::conversation(
            prompts::with_rules(INSIGHTS_PROMPT, &existing),
            state::messages(state),
        );
        let rules: UserRules =
            invoke_structured(self.model.as_ref(), &prompt, Some(&self.config)).await?;

        log::info!(
            "Learned {} style and {} content rules",
            rules.style_rules.len(),
            rules.content_rules.len()
        );
        let rules = serde_json::to_value(rules)
            .map_err(|e| GraphError::node(state::GENERATE_INSIGHTS, e.to_string()))?;
        Ok(StateUpdate::new().set(USER_RULES, rules))
    }
}

/// Copies the stored rules into the run output
pub struct GetRules;

#[async_trait]
impl Node for GetRules {
    async fn call(
        &self,
        state: &StateSnapshot,
        _config: &RunConfig,
    ) -> Result<StateUpdate, GraphError> {
        let rules = state
            .get(USER_RULES)
            .cloned()
            .unwrap_or_else(|| json!({"styleRules": [], "contentRules": []}));
        Ok(StateUpdate::new().set(RULES, rules))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adk::model::{Message, OutputSchema};
    use crate::error::ModelError;
    use crate::graph::state::RunState;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Model returning canned replies and recording every prompt
    pub(crate) struct ScriptedModel {
        reply: String,
        json: Value,
        pub(crate) prompts: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(reply: &str, json: Value) -> Self {
            Self {
                reply: reply.to_string(),
                json,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn invoke(
            &self,
            messages: &[Message],
            _config: Option<&GenerationConfig>,
        ) -> Result<Message, ModelError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok(Message::assistant(self.reply.clone()))
        }

        async fn invoke_json(
            &self,
            messages: &[Message],
            _schema: &OutputSchema,
            _config: Option<&GenerationConfig>,
        ) -> Result<Value, ModelError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok(self.json.clone())
        }
    }

    fn snapshot(rules: Option<Value>) -> StateSnapshot {
        let schema = state::schema();
        let mut run = RunState::new(&schema);
        run.apply(
            &schema,
            StateUpdate::new().set(MESSAGES, json!([Message::user("Write a tweet")])),
        )
        .unwrap();
        let shared = rules
            .map(|r| HashMap::from([(USER_RULES.to_string(), r)]))
            .unwrap_or_default();
        run.snapshot(shared)
    }

    #[tokio::test]
    async fn test_call_model_embeds_rules() {
        let model = Arc::new(ScriptedModel::new("Here is a tweet", json!(null)));
        let node = CallModel::new(model.clone(), GenerationConfig::default());

        let update = node
            .call(
                &snapshot(Some(json!({"styleRules": ["be concise"], "contentRules": []}))),
                &RunConfig::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            update.get(MESSAGES),
            Some(&json!([{"role": "assistant", "content": "Here is a tweet"}]))
        );
        assert_eq!(update.get(CONTENT_GENERATED), Some(&json!(false)));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0][0].content.contains("- be concise"));
        assert_eq!(prompts[0][1], Message::user("Write a tweet"));
    }

    #[tokio::test]
    async fn test_was_content_generated() {
        let model = Arc::new(ScriptedModel::new("", json!({"contentGenerated": true})));
        let node = WasContentGenerated::new(model, GenerationConfig::default());

        let update = node.call(&snapshot(None), &RunConfig::new()).await.unwrap();
        assert_eq!(update.get(CONTENT_GENERATED), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_generate_insights_schema_failure() {
        let model = Arc::new(ScriptedModel::new("", json!({"styleRules": "oops"})));
        let node = GenerateInsights::new(model, GenerationConfig::default());

        let err = node.call(&snapshot(None), &RunConfig::new()).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Model(ModelError::SchemaValidation { ref schema, .. })
                if schema == "UserRules"
        ));
    }

    #[tokio::test]
    async fn test_generate_insights_writes_rules() {
        let model = Arc::new(ScriptedModel::new(
            "",
            json!("{\"styleRules\": [\"short\"], \"contentRules\": [\"no links\"]}"),
        ));
        let node = GenerateInsights::new(model, GenerationConfig::default());

        let update = node.call(&snapshot(None), &RunConfig::new()).await.unwrap();
        assert_eq!(
            update.get(USER_RULES),
            Some(&json!({"styleRules": ["short"], "contentRules": ["no links"]}))
        );
    }

    #[tokio::test]
    async fn test_get_rules_copies_shared_value() {
        let rules = json!({"styleRules": ["be concise"], "contentRules": []});
        let update = GetRules
            .call(&snapshot(Some(rules.clone())), &RunConfig::new())
            .await
            .unwrap();
        assert_eq!(update.get(RULES), Some(&rules));
    }
}
