//! Scripted messages and choice lists for every funnel step, plus the
//! system context handed to the generative fallback. All user-facing copy
//! lives here so the dialogue flow stays testable against stable strings.

use leadflow_channel::{ChoiceList, ChoiceRow, ChoiceSection};
use leadflow_core::domain::turn::{ConversationTurn, TurnRole};
use leadflow_core::scheduling::CandidateSlot;
use leadflow_core::stage::Stage;

pub fn feedback_question(name: &str, topic: Option<&str>) -> ChoiceList {
    let topic_clause = topic.map(|topic| format!(" de {topic}")).unwrap_or_default();
    ChoiceList {
        title: "Como foi sua experiência?".to_owned(),
        body: format!(
            "Oi {name}! Aqui é a Nat, da equipe comercial.\n\n\
             Vi que você participou do nosso seminário{topic_clause}.\n\n\
             💬 *Pode responder pelos botões ou conversar comigo livremente!*"
        ),
        button_label: "Avaliar Seminário".to_owned(),
        footer: "Sua opinião é muito importante para nós!".to_owned(),
        sections: vec![ChoiceSection {
            title: "🎯 O que você achou do seminário?".to_owned(),
            rows: vec![
                ChoiceRow::new("feedback_positive", "😊 Gostei muito!", "Foi ótimo, aprendi bastante"),
                ChoiceRow::new("feedback_good", "👍 Gostei", "Atendeu minhas expectativas"),
                ChoiceRow::new("feedback_neutral", "😐 Mais ou menos", "Poderia ser melhor"),
                ChoiceRow::new("feedback_negative", "👎 Não gostei", "Não atendeu minhas expectativas"),
            ],
        }],
    }
}

pub fn interest_offer(first_name: &str) -> ChoiceList {
    ChoiceList {
        title: "Quer saber mais sobre a pós?".to_owned(),
        body: format!(
            "Que bom que gostou, {first_name}! 🎉\n\n\
             Participantes do seminário têm **5% de desconto** nas pós.\n\
             💬 *Use os botões ou me mande uma mensagem!*"
        ),
        button_label: "Meu Interesse".to_owned(),
        footer: "Aproveite o desconto exclusivo para participantes".to_owned(),
        sections: vec![ChoiceSection {
            title: "🎓 Interesse em Pós-Graduação".to_owned(),
            rows: vec![
                ChoiceRow::new("interest_high", "🤩 Tenho muito interesse!", "Quero saber tudo"),
                ChoiceRow::new("interest_medium", "🤔 Tenho interesse", "Quero mais detalhes"),
                ChoiceRow::new("interest_future", "🤷 Talvez futuramente", "Não é prioridade agora"),
                ChoiceRow::new("no_interest", "😅 Não tenho interesse", "Não pretendo agora"),
            ],
        }],
    }
}

pub fn meeting_proposal(name: &str) -> ChoiceList {
    ChoiceList {
        title: "Como você prefere continuar?".to_owned(),
        body: format!("Perfeito, {name}! 🎯\n\nPara garantir seu desconto e te explicar direitinho:"),
        button_label: "Como Prefere".to_owned(),
        footer: "Escolha a forma mais confortável".to_owned(),
        sections: vec![ChoiceSection {
            title: "📞 Conversa com nossa equipe".to_owned(),
            rows: vec![
                ChoiceRow::new("accept_meeting", "🤝 Sim, quero uma reunião!", "Agendar 20–30 min"),
                ChoiceRow::new("prefer_channel", "💬 Prefiro WhatsApp", "Explicar por aqui"),
                ChoiceRow::new("prefer_email", "📧 Enviem por e-mail", "Receber por e-mail"),
                ChoiceRow::new("no_time", "⏰ Não tenho tempo agora", "Fica pra depois"),
            ],
        }],
    }
}

pub fn slot_list(name: &str, slots: &[CandidateSlot]) -> ChoiceList {
    let rows = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            ChoiceRow::new(
                format!("slot_{}", index + 1),
                format!("📅 {}", slot.label),
                format!("Reunião de {} minutos", slot.duration_minutes),
            )
        })
        .collect();

    ChoiceList {
        title: "Qual horário é melhor para você?".to_owned(),
        body: format!("Ótimo, {name}! 📅\n\nTemos estes horários livres:"),
        button_label: "Escolher Horário".to_owned(),
        footer: "Escolha o que funciona melhor".to_owned(),
        sections: vec![ChoiceSection { title: "🗓️ Horários disponíveis".to_owned(), rows }],
    }
}

pub fn negative_feedback_reply(name: &str) -> String {
    format!(
        "Obrigada pelo retorno, {name}! 🙏\n\
         Posso te mandar um material resumido do seminário e, se fizer sentido, \
         te explico as trilhas de pós que mais combinam com você."
    )
}

pub fn future_interest_reply(name: &str) -> String {
    format!(
        "Tranquilo, {name}! Vou te avisar quando abrirmos novas turmas. 😉\n\
         Se mudar de ideia antes, é só me chamar."
    )
}

pub fn no_interest_reply(name: &str) -> String {
    format!(
        "Sem problema, {name}! Obrigada por participar do seminário. 🙌\n\
         Se precisar de algo ou mudar de ideia, me chama por aqui."
    )
}

pub fn channel_preference_reply(name: &str) -> String {
    format!("Ótimo, {name}! Te explico por aqui e te mando os próximos passos. 👍")
}

pub fn email_request_reply() -> String {
    "Perfeito! Me passa seu melhor e-mail para eu enviar as informações. 📧".to_owned()
}

pub fn no_time_reply() -> String {
    "Tranquilo! Quando surgir um tempinho, me chama que agendamos rapidinho. 😉".to_owned()
}

pub fn email_received_reply(name: &str) -> String {
    format!("Anotado, {name}! Já te mando as informações por e-mail. 📧")
}

pub fn no_availability_reply(name: &str) -> String {
    format!(
        "Deixa eu verificar nossa agenda, {name}! Em alguns minutos te passo horários. \
         Qual seu e-mail para eu adiantar sua ficha?"
    )
}

pub fn availability_error_reply() -> String {
    "Já organizo nossa agenda e te retorno com os horários!".to_owned()
}

pub fn booking_confirmed_reply(slot_label: &str) -> String {
    format!(
        "Pronto! ✅\n\nAgendado para {slot_label}.\n\
         Acabei de enviar o convite no seu e-mail. Até lá! 😊"
    )
}

pub fn booking_failed_reply() -> String {
    "Deu um probleminha para agendar. Vou tentar de novo!".to_owned()
}

pub fn already_scheduled_reply(slot_label: &str) -> String {
    format!("Esse horário já está garantido para você: {slot_label}. Até lá! 😊")
}

pub fn slot_unavailable_reply() -> String {
    "Ops, esse horário não está mais disponível.".to_owned()
}

pub fn snapshot_missing_reply() -> String {
    "Deixa eu verificar os horários de novo!".to_owned()
}

pub fn generic_fallback_reply() -> String {
    "Ops, tive um probleminha aqui! Me dá uns segundinhos?".to_owned()
}

pub fn free_selection_note(code: &str) -> String {
    format!("Selecionou: {code}")
}

/// Deterministic per-stage reply used whenever the generative call fails,
/// times out, or is not configured.
pub fn fallback_for_stage(stage: Stage, name: &str) -> String {
    match stage {
        Stage::Initial => format!("Oi {name}! Como você achou nosso seminário?"),
        Stage::PostFeedbackPrompt => {
            "Perfeito! Quer que eu te mostre as opções com desconto?".to_owned()
        }
        Stage::PostFeedback => "Legal! Quer conhecer as opções que combinam com você?".to_owned(),
        Stage::PostInterest => "Maravilha. Prefere WhatsApp ou já agendamos 15 min?".to_owned(),
        Stage::PostMeetingPref | Stage::PostMeetingAccept => {
            "Fechado. Se surgir um tempinho, me chama que agendamos rapidinho.".to_owned()
        }
        Stage::EmailProvided | Stage::PostEmail => {
            "Recebi seu e-mail! Já te mando as informações e podemos agendar.".to_owned()
        }
        Stage::FreeConversation => {
            "Entendi. Posso te passar as opções e garantir um descontinho?".to_owned()
        }
    }
}

/// System context for the generative fallback: persona, knowledge snippet,
/// current stage strategy, and the recent exchange.
pub fn system_context(
    stage: Stage,
    name: &str,
    knowledge_context: &str,
    history: &[ConversationTurn],
) -> String {
    let mut conversation = String::new();
    for turn in history.iter().rev().take(4).collect::<Vec<_>>().into_iter().rev() {
        let role = match turn.role {
            TurnRole::User => "Humano",
            TurnRole::Assistant => "Assistente",
            TurnRole::System => continue,
        };
        conversation.push_str(&format!("{role}: {}\n", turn.text));
    }

    format!(
        "Você é a Nat, consultora comercial conversando por WhatsApp com {name}.\n\n\
         CONTEXTO:\n{knowledge_context}\n\n\
         SITUAÇÃO ATUAL: {stage}\n\
         HISTÓRICO RECENTE:\n{conversation}\n\
         OBJETIVO PRINCIPAL: Converter leads pós-seminário em reuniões comerciais.\n\n\
         ESTRATÉGIA POR ETAPA:\n\
         - initial: Perguntar sobre o seminário\n\
         - post_feedback_prompt/post_feedback: Oferecer desconto e checar interesse\n\
         - post_interest: Propor reunião com a equipe comercial\n\
         - post_meeting_pref/post_meeting_accept: Facilitar o agendamento\n\
         - email_provided/post_email: Confirmar o e-mail e encaminhar o agendamento\n\
         - free_conversation: Responder e conduzir ao agendamento\n\n\
         JEITO DE FALAR:\n\
         - Natural, brasileira, consultiva; emojis moderados\n\
         - Respostas curtas (máx. 3 linhas)\n\
         - Se perguntarem preços, direcione para reunião\n\
         - Não invente nada fora do CONTEXTO",
        stage = stage.as_str(),
    )
}
