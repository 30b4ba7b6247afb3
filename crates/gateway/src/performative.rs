use serde::{Deserialize, Serialize};

/// FIPA-style intent tag carried by every [`crate::message::Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Performative {
    Request,
    Agree,
    Refuse,
    Failure,
    Inform,
    Confirm,
    Disconfirm,
    QueryIf,
    NotUnderstood,
    Cfp,
    Propose,
    Cancel,
}

impl Performative {
    /// Default performative for a `classTag` ending in `Req`.
    pub fn default_for_class_tag(class_tag: &str) -> Self {
        if class_tag.ends_with("Req") {
            Performative::Request
        } else {
            Performative::Inform
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Performative::Request => "REQUEST",
            Performative::Agree => "AGREE",
            Performative::Refuse => "REFUSE",
            Performative::Failure => "FAILURE",
            Performative::Inform => "INFORM",
            Performative::Confirm => "CONFIRM",
            Performative::Disconfirm => "DISCONFIRM",
            Performative::QueryIf => "QUERY_IF",
            Performative::NotUnderstood => "NOT_UNDERSTOOD",
            Performative::Cfp => "CFP",
            Performative::Propose => "PROPOSE",
            Performative::Cancel => "CANCEL",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "REQUEST" => Performative::Request,
            "AGREE" => Performative::Agree,
            "REFUSE" => Performative::Refuse,
            "FAILURE" => Performative::Failure,
            "INFORM" => Performative::Inform,
            "CONFIRM" => Performative::Confirm,
            "DISCONFIRM" => Performative::Disconfirm,
            "QUERY_IF" => Performative::QueryIf,
            "NOT_UNDERSTOOD" => Performative::NotUnderstood,
            "CFP" => Performative::Cfp,
            "PROPOSE" => Performative::Propose,
            "CANCEL" => Performative::Cancel,
            _ => return None,
        })
    }
}

impl Default for Performative {
    fn default() -> Self {
        Performative::Inform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_follows_req_suffix() {
        assert_eq!(
            Performative::default_for_class_tag("org.arl.fjage.shell.ShellExecReq"),
            Performative::Request
        );
        assert_eq!(
            Performative::default_for_class_tag("org.arl.fjage.Message"),
            Performative::Inform
        );
    }

    #[test]
    fn wire_round_trip() {
        for p in [
            Performative::Request,
            Performative::Agree,
            Performative::Refuse,
            Performative::Failure,
            Performative::Inform,
            Performative::Confirm,
            Performative::Disconfirm,
            Performative::QueryIf,
            Performative::NotUnderstood,
            Performative::Cfp,
            Performative::Propose,
            Performative::Cancel,
        ] {
            assert_eq!(Performative::from_wire(p.as_wire()), Some(p));
        }
    }

    #[test]
    fn unknown_wire_value_is_none() {
        assert_eq!(Performative::from_wire("BOGUS"), None);
    }
}
