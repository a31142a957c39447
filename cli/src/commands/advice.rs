use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};

use healthlens_core::advice::find_section;
use healthlens_core::llm::{ChatSession, CompletionProvider};
use healthlens_core::models::{AdviceHeading, DatasetKind};
use healthlens_core::service::HealthService;

use super::helpers::print_json;

pub(crate) fn cmd_advice(
    service: &HealthService,
    provider: &dyn CompletionProvider,
    model: &str,
    regenerate: bool,
    section: Option<&str>,
    json: bool,
) -> Result<()> {
    if let Some(key) = section {
        if AdviceHeading::from_key(key).is_none() {
            bail!("Unknown section '{key}'. Use nutrition, weight or activity");
        }
    }
    let advice = service.advice(provider, model, regenerate)?;

    if let Some(key) = section {
        let Some(found) = find_section(&advice.sections, key) else {
            bail!("The advice has no '{key}' section. Try --regenerate");
        };
        if json {
            return print_json(found);
        }
        println!("=== {} ===\n", found.clean_title());
        println!("{}", found.content);
        return Ok(());
    }

    if json {
        return print_json(&advice);
    }

    if advice.sections.is_empty() {
        println!("{}", advice.text.trim());
        return Ok(());
    }
    for s in &advice.sections {
        println!("=== {} ===\n", s.clean_title());
        println!("{}\n", s.content);
    }
    if advice.cached {
        eprintln!("Showing cached advice. Pass --regenerate for fresh advice.");
    }

    Ok(())
}

/// Ask one question, or start an interactive session when none is given.
pub(crate) fn cmd_chat(
    service: &HealthService,
    provider: &dyn CompletionProvider,
    model: &str,
    kind: DatasetKind,
    question: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut session = ChatSession::new(kind);

    if let Some(q) = question {
        let answer = service.chat(&mut session, provider, model, q)?;
        if json {
            println!("{}", serde_json::json!({ "kind": kind, "question": q.trim(), "answer": answer }));
        } else {
            println!("{answer}");
        }
        return Ok(());
    }

    eprintln!("Chatting about your {kind} data. Empty line to finish.");
    let stdin = io::stdin();
    loop {
        eprint!("\n> ");
        io::stderr().flush()?;
        let Some(line) = stdin.lock().lines().next().transpose()? else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }
        match service.chat(&mut session, provider, model, &line) {
            Ok(answer) => println!("{answer}"),
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }

    if json {
        let transcript: Vec<_> = session.transcript().collect();
        print_json(&transcript)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use healthlens_core::db::AdviceCache;
    use healthlens_core::llm::{ChatMessage, ChatRequest, DEFAULT_MODEL};

    /// Counts requests and always fails.
    struct Offline {
        calls: Cell<usize>,
    }

    impl CompletionProvider for Offline {
        fn complete(&self, _request: &ChatRequest) -> Result<ChatMessage> {
            self.calls.set(self.calls.get() + 1);
            bail!("offline")
        }
    }

    const CACHED: &str = "## Nutrition Advice\nEat more fiber.";

    #[test]
    fn test_unknown_section_rejected_before_request() {
        let service = HealthService::new_in_memory().unwrap();
        AdviceCache::new(service.database()).set(CACHED).unwrap();
        let provider = Offline { calls: Cell::new(0) };

        let err = cmd_advice(&service, &provider, DEFAULT_MODEL, true, Some("bogus"), false)
            .unwrap_err();
        assert!(err.to_string().contains("Unknown section"));
        assert_eq!(provider.calls.get(), 0);
        assert_eq!(
            AdviceCache::new(service.database()).get().unwrap().as_deref(),
            Some(CACHED)
        );
    }

    #[test]
    fn test_cached_section_needs_no_request() {
        let service = HealthService::new_in_memory().unwrap();
        AdviceCache::new(service.database()).set(CACHED).unwrap();
        let provider = Offline { calls: Cell::new(0) };

        cmd_advice(&service, &provider, DEFAULT_MODEL, false, Some("nutrition"), true).unwrap();
        assert_eq!(provider.calls.get(), 0);
        assert!(cmd_advice(&service, &provider, DEFAULT_MODEL, false, Some("activity"), true).is_err());
    }
}
