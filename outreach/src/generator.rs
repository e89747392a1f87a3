//! Template-based content generator
//!
//! Substitutes `{placeholder}` tokens in the subject and body with
//! target attributes. The builtins `{id}` and `{contact_address}`
//! always resolve; anything else must be present in the target's
//! attributes or the target is unrenderable.

use async_trait::async_trait;
use outreach_common::{
    Message, Target,
    traits::{ContentGenerator, RenderError},
};
use serde::{Deserialize, Serialize};

/// Subject and body templates for a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub subject: String,
    pub body: String,
}

/// Renders messages by substituting target attributes into templates.
#[derive(Debug)]
pub struct TemplateGenerator {
    template: Template,
}

impl TemplateGenerator {
    #[must_use]
    pub const fn new(template: Template) -> Self {
        Self { template }
    }

    fn substitute(text: &str, target: &Target) -> Result<String, RenderError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(RenderError::Permanent(format!(
                    "unterminated placeholder in template: {text}"
                )));
            };
            let key = &after[..close];

            let value = match key {
                "id" => target.id.as_str(),
                "contact_address" => target.contact_address.as_str(),
                _ => target.attributes.get(key).map(String::as_str).ok_or_else(|| {
                    RenderError::Permanent(format!(
                        "target {} has no attribute for placeholder {{{key}}}",
                        target.id
                    ))
                })?,
            };
            out.push_str(value);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn render(&self, target: &Target) -> Result<Message, RenderError> {
        let subject = Self::substitute(&self.template.subject, target)?;
        let body = Self::substitute(&self.template.body, target)?;
        Ok(Message::new(
            target.id.clone(),
            target.contact_address.clone(),
            subject,
            body,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn generator() -> TemplateGenerator {
        TemplateGenerator::new(Template {
            subject: "Hi {name}".to_string(),
            body: "Hello {name}, we found {id} at {contact_address}.".to_string(),
        })
    }

    #[tokio::test]
    async fn test_substitutes_attributes_and_builtins() {
        let target =
            Target::new("biz-1", 10, "owner@example.com").with_attribute("name", "Example Bakery");

        let message = generator().render(&target).await.unwrap();
        assert_eq!(message.subject, "Hi Example Bakery");
        assert_eq!(
            message.body,
            "Hello Example Bakery, we found biz-1 at owner@example.com."
        );
    }

    #[tokio::test]
    async fn test_missing_attribute_is_permanent() {
        let target = Target::new("biz-2", 10, "owner@example.com");

        let err = generator().render(&target).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("name"));
    }

    #[tokio::test]
    async fn test_unterminated_placeholder_is_permanent() {
        let generator = TemplateGenerator::new(Template {
            subject: "Hi {name".to_string(),
            body: String::new(),
        });
        let target = Target::new("biz-3", 0, "x@example.com").with_attribute("name", "X");

        let err = generator.render(&target).await.unwrap_err();
        assert!(err.is_permanent());
    }
}
