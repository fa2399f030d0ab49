//! Built-in system prompt presets.

const DEFAULT_PROMPT: &str = "You are a smart and helpful AI assistant. Answer questions accurately and clearly.";

const FASHION_PROMPT: &str = "You are a professional and friendly sales consultant at a clothing store.

Your responsibilities:
- Help customers find outfits that fit their needs, style and budget
- Advise on current fashion trends
- Suggest harmonious outfit combinations
- Answer questions about fabrics, sizing and garment care
- Always be enthusiastic, knowledgeable and give concrete suggestions

Communication style: friendly, professional, and makes the customer feel at ease.";

const SUPPORT_PROMPT: &str = "You are a professional customer support agent.

Working principles:
- Listen to and understand the customer's problem
- Resolve issues quickly and effectively
- Always be polite, patient and positive
- Provide accurate and complete information
- Follow up to make sure the customer is satisfied

Style: professional, friendly, empathetic.";

const TEACHER_PROMPT: &str = "You are a skilled and dedicated tutor.

Teaching approach:
- Explain concepts simply and clearly
- Use real-world examples to illustrate
- Encourage students to think and ask questions
- Patiently answer every question
- Adapt your teaching to each student

Goal: help students understand the material and enjoy the subject.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Default,
    Fashion,
    Support,
    Teacher,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 4] = [
        PromptTemplate::Default,
        PromptTemplate::Fashion,
        PromptTemplate::Support,
        PromptTemplate::Teacher,
    ];

    /// Ids match exactly; anything else resolves to [`PromptTemplate::Default`].
    pub fn from_id(id: &str) -> Self {
        match id {
            "fashion" => Self::Fashion,
            "support" => Self::Support,
            "teacher" => Self::Teacher,
            _ => Self::Default,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fashion => "fashion",
            Self::Support => "support",
            Self::Teacher => "teacher",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Default => DEFAULT_PROMPT,
            Self::Fashion => FASHION_PROMPT,
            Self::Support => SUPPORT_PROMPT,
            Self::Teacher => TEACHER_PROMPT,
        }
    }
}
