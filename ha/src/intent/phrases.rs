//! Fixed phrase lists, all lowercase with straight apostrophes

pub const CURRENT_TASK: &[&str] = &[
    "what is my current task",
    "what's my current task",
    "what task am i on",
    "current task",
    "what's next",
    "what is next",
    "next task",
    "what comes next",
    "what should i do next",
    "what do i do next",
];

pub const TASK_HELP: &[&str] = &[
    "help me with",
    "explain",
    "simplify",
    "what does this mean",
    "help with task",
    "help with current",
    "break down",
    "clarify",
    "don't understand",
    "confused about",
    "guide me",
    "assist with",
    "help me understand",
];

pub const DOCUMENTS: &[&str] = &[
    "which documents",
    "what documents",
    "documents do i need",
    "required documents",
    "document template",
    "suggest a document",
    "what paperwork",
    "which forms",
];

pub const STATUS: &[&str] = &[
    "status",
    "progress",
    "next",
    "step",
    "task",
    "completed",
    "done",
    "where am i",
    "current",
    "phase",
    "what do i need",
    "what should i do",
    "what's next",
    "overview",
    "todo",
    "procedure",
    "checklist",
    "tasks",
    "remaining",
    "pending",
    "finished",
];
