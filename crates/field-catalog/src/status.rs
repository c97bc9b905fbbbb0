/// Official system-state names reported by `ENERGY.STAT_STATE`, in code order.
/// Consumers match on this text, so entries are kept verbatim (including device typos).
pub const STATUS_CODES: &[(u64, &str)] = &[
    (0, "INITIALZUSTAND"),
    (1, "KEINE KOMMUNIKATION LADEGERAET"),
    (2, "FEHLER LEISTUNGSMESSGERAET"),
    (3, "RUNDSTEUEREMPFAENGER"),
    (4, "ERSTLADUNG"),
    (5, "WARTUNGSLADUNG"),
    (6, "WARTUNGSLADUNG FERTIG"),
    (7, "WARTUNG NOTWENDIG"),
    (8, "MAN. SICHERHEITSLADUNG"),
    (9, "SICHERHEITSLADUNG FERTIG"),
    (10, "VOLLLADUNG"),
    (11, "AUSGLEICHSLADUNG: LADEN"),
    (12, "SULFATLADUNG: LADEN"),
    (13, "AKKU VOLL"),
    (14, "LADEN"),
    (15, "AKKU LEER"),
    (16, "ENTLADEN"),
    (17, "PV + ENTLADEN"),
    (18, "NETZ + ENTLADEN"),
    (19, "PASSIV"),
    (20, "AUSGESCHALTET"),
    (21, "EIGENVERBRAUCH"),
    (22, "NEUSTART"),
    (23, "MAN. AUSGLEICHSLADUNG: LADEN"),
    (24, "MAN. SULFATLADUNG: LADEN"),
    (25, "SICHERHEITSLADUNG"),
    (26, "AKKU-SCHUTZBETRIEB"),
    (27, "EG FEHLER"),
    (28, "EG LADEN"),
    (29, "EG ENTLADEN"),
    (30, "EG PASSIV"),
    (31, "EG LADEN VERBOTEN"),
    (32, "EG ENTLADEN VERBOTEN"),
    (33, "NOTLADUNG"),
    (34, "SOFTWAREAKTUALISIERUNG"),
    (35, "FEHLER: NA-SCHUTZ"),
    (36, "FEHLER: NA-SCHUTZ NETZ"),
    (37, "FEHLER: NA-SCHUTZ HARDWARE"),
    (38, "KEINE SERVERVERBINDUNG"),
    (39, "BMS FEHLER"),
    (40, "WARTUNG: FILTER"),
    (41, "SCHLAFMODUS"),
    (42, "WARTE AUF ÜBERSCHUSS"),
    (43, "KAPAZITÄTSTEST: LADEN"),
    (44, "KAPAZITÄTSTEST: ENTLADEN"),
    (45, "MAN. SULFATLADUNG: WARTEN"),
    (46, "MAN. SULFATLADUNG: FERTIG"),
    (47, "MAN. SULFATLADUNG: FEHLER"),
    (48, "AUSGLEICHSLADUNG: WARTEN"),
    (49, "NOTLADUNG: FEHLER"),
    (50, "MAN: AUSGLEICHSLADUNG: WARTEN"),
    (51, "MAN: AUSGLEICHSLADUNG: FEHLER"),
    (52, "MAN: AUSGLEICHSLADUNG: FERTIG"),
    (53, "AUTO: SULFATLADUNG: WARTEN"),
    (54, "LADESCHLUSSPHASE"),
    (55, "BATTERIETRENNSCHALTER AUS"),
    (56, "PEAK-SHAVING: WARTEN"),
    (57, "FEHLER LADEGERAET"),
    (58, "NPU-FEHLER"),
    (59, "BMS OFFLINE"),
    (60, "WARTUNGSLADUNG FEHLER"),
    (61, "MAN. SICHERHEITSLADUNG FEHLER"),
    (62, "SICHERHEITSLADUNG FEHLER"),
    (63, "KEINE MASTERVERBINDUNG"),
    (64, "LITHIUM SICHERHEITSMODUS AKTIV"),
    (65, "LITHIUM SICHERHEITSMODUS BEENDET"),
    (66, "FEHLER BATTERIESPANNUNG"),
    (67, "BMS DC AUSGESCHALTET"),
    (68, "NETZINITIALISIERUNG"),
    (69, "NETZSTABILISIERUNG"),
    (70, "FERNABSCHALTUNG"),
    (71, "OFFPEAK-LADEN"),
    (72, "FEHLER HALBBRÜCKE"),
    (73, "BMS: FEHLER BETRIEBSTEMPERATUR"),
    (74, "FACOTRY SETTINGS NICHT GEFUNDEN"),
    (75, "NETZERSATZBETRIEB"),
    (76, "NETZERSATZBETRIEB AKKU LEER"),
    (77, "NETZERSATZBETRIEB FEHLER"),
    (78, "INITIALISIERUNG"),
    (79, "INSTALLATIONSMODUS"),
    (80, "NETZAUSFALL"),
    (81, "BMS UPDATE ERFORDERLICH"),
    (82, "BMS KONFIGURATION ERFORDERLICH"),
    (83, "ISOLATIONSTEST"),
    (84, "SELBSTTEST"),
    (85, "EXTERNE STEUERUNG"),
];
