//! Catalog of prebuilt remote voices.

/// A prebuilt voice offered by the remote synthesis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteVoice {
    pub id: &'static str,
    pub description: &'static str,
}

/// Voice used when nothing else is selected.
pub const DEFAULT_REMOTE_VOICE: &str = "Kore";

pub const REMOTE_VOICES: [RemoteVoice; 13] = [
    RemoteVoice { id: "Kore", description: "Firm (หนักแน่น)" },
    RemoteVoice { id: "Puck", description: "Upbeat (สดใส)" },
    RemoteVoice { id: "Zephyr", description: "Bright (สว่าง)" },
    RemoteVoice { id: "Charon", description: "Informative (ให้ข้อมูล)" },
    RemoteVoice { id: "Fenrir", description: "Excitable (ตื่นเต้น)" },
    RemoteVoice { id: "Leda", description: "Youthful (เยาว์วัย)" },
    RemoteVoice { id: "Aoede", description: "Breezy (โปร่งเบา)" },
    RemoteVoice { id: "Enceladus", description: "Breathy (เบาๆ)" },
    RemoteVoice { id: "Achernar", description: "Soft (นุ่มนวล)" },
    RemoteVoice { id: "Gacrux", description: "Mature (ผู้ใหญ่)" },
    RemoteVoice { id: "Achird", description: "Friendly (เป็นมิตร)" },
    RemoteVoice { id: "Vindemiatrix", description: "Gentle (อ่อนโยน)" },
    RemoteVoice { id: "Sulafat", description: "Warm (อบอุ่น)" },
];

/// Look up a voice by id, ignoring ASCII case.
pub fn find_voice(id: &str) -> Option<&'static RemoteVoice> {
    REMOTE_VOICES
        .iter()
        .find(|voice| voice.id.eq_ignore_ascii_case(id.trim()))
}
