pub const DEFAULT_TENANT: &str = "default";
pub const DEFAULT_THREAD: &str = "default_thread";

pub const DEFAULT_TOP_K: u32 = 7;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.0;
pub const DEFAULT_HISTORY_WINDOW: usize = 5;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_RETRIEVAL_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_RESPONSE_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_RETRIEVAL_MODEL: &str = "databricks-meta-llama-3-3-70b-instruct";
pub const DEFAULT_RESPONSE_MODEL: &str = "databricks-meta-llama-3-3-70b-instruct";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the SOP Assistant. You answer questions about \
store policies and standard operating procedures using only the policy excerpts you are given. \
Cite the source of every fact you use.";

pub const DEFAULT_RETRIEVAL_PROMPT: &str = "You write search queries for a store policy and SOP \
knowledge base.\n\
Given the conversation so far and the latest question, reply with one concise search query that \
captures what the user needs. Reply with the query only.\n\n\
Conversation:\n{conversation}\n\n\
Latest question: {search_query}\n\n\
Search query:";

pub const DEFAULT_RAG_PROMPT: &str = "Answer the latest question using only the policy excerpts \
below. Cite each source you rely on. If the excerpts do not cover the question, say so plainly.\n\n\
Conversation:\n{conversation}\n\n\
Policy excerpts:\n{context}\n\n\
Latest question: {search_query}\n\n\
Answer:";

pub const NO_CONTEXT_FOUND: &str = "No relevant policy information found.";
