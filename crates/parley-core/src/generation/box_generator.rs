//! BoxTextGenerator: object-safe dynamic dispatch wrapper for TextGenerator.
//!
//! 1. `TextGeneratorDyn` is the object-safe mirror with boxed futures
//! 2. Blanket impl of `TextGeneratorDyn` for every `T: TextGenerator`
//! 3. `BoxTextGenerator` wraps `Box<dyn TextGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use parley_types::error::GenerationError;

use super::provider::{GenerationRequest, TextGenerator};

/// Object-safe version of [`TextGenerator`] with boxed futures.
pub trait TextGeneratorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

impl<T: TextGenerator> TextGeneratorDyn for T {
    fn name(&self) -> &str {
        TextGenerator::name(self)
    }

    fn model(&self) -> &str {
        TextGenerator::model(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(self.generate(request))
    }
}

/// Type-erased text generator, selected at runtime from configuration.
pub struct BoxTextGenerator {
    inner: Box<dyn TextGeneratorDyn + Send + Sync>,
}

impl BoxTextGenerator {
    pub fn new<T: TextGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.inner.generate_boxed(request).await
    }
}

impl std::fmt::Debug for BoxTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTextGenerator")
            .field("name", &self.name())
            .field("model", &self.model())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl TextGenerator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            Ok(request.user_prompt.clone())
        }
    }

    #[tokio::test]
    async fn boxed_generator_delegates() {
        let generator = BoxTextGenerator::new(Echo);
        assert_eq!(generator.name(), "echo");
        assert_eq!(generator.model(), "echo-1");
        let out = generator
            .generate(&GenerationRequest::new("sys", "hello", 10))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }
}
